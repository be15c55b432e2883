//! Wire protocol definitions and encoding.
//!
//! Two framing generations exist. [`Generation`] dispatches to the
//! matching module; everything here is pure and performs no I/O.

pub mod gen1;
pub mod gen2;

use crate::model::Capabilities;

/// Protocol generation of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Original, Mini.
    Gen1,
    /// Original V2, XL.
    Gen2,
}

/// Identification strings stored on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdString {
    SerialNumber,
    FirmwareVersion,
}

impl Generation {
    /// Image report header size.
    pub fn image_header_length(&self) -> usize {
        match self {
            Generation::Gen1 => gen1::IMAGE_HEADER_LENGTH,
            Generation::Gen2 => gen2::IMAGE_HEADER_LENGTH,
        }
    }

    /// Writes the image header for one page and returns its length.
    ///
    /// `remaining` counts the image bytes not yet sent, including the ones
    /// this page will carry.
    pub fn write_image_header(
        &self,
        buffer: &mut [u8],
        key: usize,
        remaining: usize,
        payload_length: usize,
        page: usize,
    ) -> usize {
        let last = remaining <= payload_length;
        match self {
            Generation::Gen1 => gen1::write_image_header(buffer, key, last, page),
            Generation::Gen2 => {
                let this_length = remaining.min(payload_length);
                gen2::write_image_header(buffer, key, last, this_length, page)
            }
        }
    }

    /// Status bytes preceding the key states in an input report.
    pub fn key_state_offset(&self) -> usize {
        match self {
            Generation::Gen1 => gen1::KEY_STATE_OFFSET,
            Generation::Gen2 => gen2::KEY_STATE_OFFSET,
        }
    }

    /// Input report length for a panel with `key_count` keys.
    pub fn key_state_report_length(&self, key_count: usize) -> usize {
        self.key_state_offset() + key_count
    }

    /// Decodes an input report into one flag per key.
    ///
    /// `report` holds only the bytes actually read. Keys past the end of a
    /// short report are reported as released.
    pub fn decode_key_states(&self, report: &[u8], key_count: usize) -> Vec<bool> {
        let mut states: Vec<bool> = report
            .iter()
            .skip(self.key_state_offset())
            .take(key_count)
            .map(|&b| b != 0)
            .collect();
        states.resize(key_count, false);
        states
    }

    /// Feature report size.
    pub fn feature_report_length(&self) -> usize {
        match self {
            Generation::Gen1 => gen1::FEATURE_REPORT_LENGTH,
            Generation::Gen2 => gen2::FEATURE_REPORT_LENGTH,
        }
    }

    /// Builds the reset feature report.
    pub fn reset_report(&self) -> Vec<u8> {
        match self {
            Generation::Gen1 => gen1::build_reset_report().to_vec(),
            Generation::Gen2 => gen2::build_reset_report().to_vec(),
        }
    }

    /// Builds the brightness feature report.
    pub fn brightness_report(&self, percent: u8) -> Vec<u8> {
        match self {
            Generation::Gen1 => gen1::build_brightness_report(percent).to_vec(),
            Generation::Gen2 => gen2::build_brightness_report(percent).to_vec(),
        }
    }

    /// Feature report id and string offset for an identification query.
    fn id_report(&self, id: IdString) -> (u8, usize) {
        match (self, id) {
            (Generation::Gen1, IdString::SerialNumber) => {
                (gen1::SERIAL_NUMBER_REPORT, gen1::ID_STRING_OFFSET)
            }
            (Generation::Gen1, IdString::FirmwareVersion) => {
                (gen1::FIRMWARE_VERSION_REPORT, gen1::ID_STRING_OFFSET)
            }
            (Generation::Gen2, IdString::SerialNumber) => {
                (gen2::SERIAL_NUMBER_REPORT, gen2::SERIAL_NUMBER_OFFSET)
            }
            (Generation::Gen2, IdString::FirmwareVersion) => {
                (gen2::FIRMWARE_VERSION_REPORT, gen2::FIRMWARE_VERSION_OFFSET)
            }
        }
    }

    /// Builds the buffer handed to a get-feature-report call.
    pub fn identification_request(&self, id: IdString) -> Vec<u8> {
        let mut buffer = vec![0u8; self.feature_report_length()];
        buffer[0] = self.id_report(id).0;
        buffer
    }

    /// Extracts the ASCII string from an identification response.
    ///
    /// `response` holds only the bytes actually returned. A response that
    /// ends at or before the string offset yields an empty string.
    pub fn parse_identification(&self, id: IdString, response: &[u8]) -> String {
        let offset = self.id_report(id).1;
        if response.len() <= offset {
            return String::new();
        }
        let text = &response[offset..];
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        String::from_utf8_lossy(&text[..end]).into_owned()
    }
}

/// Iterator over the image reports for one key.
///
/// Every report is exactly `report_length` bytes. An empty payload still
/// produces a single, final report.
pub struct ImageFrames<'a> {
    caps: &'a Capabilities,
    key: usize,
    payload: &'a [u8],
    offset: usize,
    page: usize,
    finished: bool,
}

/// Splits `payload` into image reports addressed to `key`.
///
/// The key index is not validated here.
pub fn image_frames<'a>(caps: &'a Capabilities, key: usize, payload: &'a [u8]) -> ImageFrames<'a> {
    ImageFrames {
        caps,
        key,
        payload,
        offset: 0,
        page: 0,
        finished: false,
    }
}

impl Iterator for ImageFrames<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let payload_length = self.caps.payload_length();
        let remaining = self.payload.len() - self.offset;
        let mut frame = vec![0u8; self.caps.report_length];

        let header_length = self.caps.generation.write_image_header(
            &mut frame,
            self.key,
            remaining,
            payload_length,
            self.page,
        );

        let this_length = remaining.min(payload_length);
        frame[header_length..header_length + this_length]
            .copy_from_slice(&self.payload[self.offset..self.offset + this_length]);

        self.offset += this_length;
        self.page += 1;
        self.finished = self.offset == self.payload.len();

        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let remaining = self.payload.len() - self.offset;
        let count = remaining.div_ceil(self.caps.payload_length()).max(1);
        (count, Some(count))
    }
}

impl ExactSizeIterator for ImageFrames<'_> {}
