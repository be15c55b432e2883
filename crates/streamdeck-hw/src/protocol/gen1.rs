//! First generation wire format (Original, Mini).
//!
//! Image report layout:
//! - `[0x02, 0x01, page + 1, 0x00, last, key + 1, 0x00 ...]` (16 byte header)
//! - image bytes, zero padded to the model's report length
//!
//! Feature reports are 17 bytes long.

/// Image report header size.
pub const IMAGE_HEADER_LENGTH: usize = 16;

/// Feature report size (report id included).
pub const FEATURE_REPORT_LENGTH: usize = 17;

/// Status bytes preceding the key states in an input report.
pub const KEY_STATE_OFFSET: usize = 1;

/// Output report id for image data.
pub const IMAGE_REPORT_ID: u8 = 0x02;

/// Image command byte.
pub const IMAGE_COMMAND: u8 = 0x01;

/// Feature report ids.
pub const SERIAL_NUMBER_REPORT: u8 = 0x03;
pub const FIRMWARE_VERSION_REPORT: u8 = 0x04;
pub const BRIGHTNESS_REPORT: u8 = 0x05;
pub const RESET_REPORT: u8 = 0x0B;

/// Offset of the ASCII payload in identification responses.
pub const ID_STRING_OFFSET: usize = 5;

/// Writes an image header into `buffer` and returns the header length.
///
/// `page` is zero based; the device expects it one based, as with `key`.
pub fn write_image_header(buffer: &mut [u8], key: usize, last: bool, page: usize) -> usize {
    buffer[0] = IMAGE_REPORT_ID;
    buffer[1] = IMAGE_COMMAND;
    buffer[2] = (page + 1) as u8;
    buffer[3] = 0x00;
    buffer[4] = last as u8;
    buffer[5] = (key + 1) as u8;
    buffer[6..IMAGE_HEADER_LENGTH].fill(0);
    IMAGE_HEADER_LENGTH
}

/// Builds the "show logo" reset feature report.
pub fn build_reset_report() -> [u8; FEATURE_REPORT_LENGTH] {
    let mut buffer = [0u8; FEATURE_REPORT_LENGTH];
    buffer[0] = RESET_REPORT;
    buffer[1] = 0x63;
    buffer
}

/// Builds the brightness feature report.
pub fn build_brightness_report(percent: u8) -> [u8; FEATURE_REPORT_LENGTH] {
    let mut buffer = [0u8; FEATURE_REPORT_LENGTH];
    buffer[0] = BRIGHTNESS_REPORT;
    buffer[1] = 0x55;
    buffer[2] = 0xAA;
    buffer[3] = 0xD1;
    buffer[4] = 0x01;
    buffer[5] = percent;
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_header() {
        let mut buffer = [0xFFu8; 32];
        let len = write_image_header(&mut buffer, 4, false, 0);
        assert_eq!(len, IMAGE_HEADER_LENGTH);
        assert_eq!(&buffer[..6], &[0x02, 0x01, 0x01, 0x00, 0x00, 0x05]);
        assert!(buffer[6..16].iter().all(|&b| b == 0));
        // Payload area untouched
        assert_eq!(buffer[16], 0xFF);

        write_image_header(&mut buffer, 0, true, 1);
        assert_eq!(&buffer[..6], &[0x02, 0x01, 0x02, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_reset_report() {
        let report = build_reset_report();
        assert_eq!(report.len(), 17);
        assert_eq!(&report[..2], &[0x0B, 0x63]);
        assert!(report[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_brightness_report() {
        let report = build_brightness_report(42);
        assert_eq!(report.len(), 17);
        assert_eq!(&report[..6], &[0x05, 0x55, 0xAA, 0xD1, 0x01, 42]);
        assert!(report[6..].iter().all(|&b| b == 0));
    }
}
