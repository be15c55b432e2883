//! Second generation wire format (Original V2, XL).
//!
//! Image report layout:
//! - `[0x02, 0x07, key, last, len_lo, len_hi, page_lo, page_hi]` (8 byte header)
//! - image bytes, zero padded to 1024 bytes
//!
//! Feature reports are 32 bytes long.

/// Image report header size.
pub const IMAGE_HEADER_LENGTH: usize = 8;

/// Feature report size (report id included).
pub const FEATURE_REPORT_LENGTH: usize = 32;

/// Status bytes preceding the key states in an input report.
pub const KEY_STATE_OFFSET: usize = 4;

/// Output report id for image data.
pub const IMAGE_REPORT_ID: u8 = 0x02;

/// Image command byte.
pub const IMAGE_COMMAND: u8 = 0x07;

/// Feature report id shared by reset and brightness.
pub const CONTROL_REPORT: u8 = 0x03;
pub const RESET_COMMAND: u8 = 0x02;
pub const BRIGHTNESS_COMMAND: u8 = 0x08;

/// Identification feature report ids.
pub const FIRMWARE_VERSION_REPORT: u8 = 0x05;
pub const SERIAL_NUMBER_REPORT: u8 = 0x06;

/// Offsets of the ASCII payload in identification responses.
pub const SERIAL_NUMBER_OFFSET: usize = 2;
pub const FIRMWARE_VERSION_OFFSET: usize = 6;

/// Writes an image header into `buffer` and returns the header length.
///
/// `this_length` is the number of image bytes carried by this report.
pub fn write_image_header(
    buffer: &mut [u8],
    key: usize,
    last: bool,
    this_length: usize,
    page: usize,
) -> usize {
    buffer[0] = IMAGE_REPORT_ID;
    buffer[1] = IMAGE_COMMAND;
    buffer[2] = key as u8;
    buffer[3] = last as u8;

    // Length and page (little-endian)
    buffer[4..6].copy_from_slice(&(this_length as u16).to_le_bytes());
    buffer[6..8].copy_from_slice(&(page as u16).to_le_bytes());

    IMAGE_HEADER_LENGTH
}

/// Builds the "show logo" reset feature report.
pub fn build_reset_report() -> [u8; FEATURE_REPORT_LENGTH] {
    let mut buffer = [0u8; FEATURE_REPORT_LENGTH];
    buffer[0] = CONTROL_REPORT;
    buffer[1] = RESET_COMMAND;
    buffer
}

/// Builds the brightness feature report.
pub fn build_brightness_report(percent: u8) -> [u8; FEATURE_REPORT_LENGTH] {
    let mut buffer = [0u8; FEATURE_REPORT_LENGTH];
    buffer[0] = CONTROL_REPORT;
    buffer[1] = BRIGHTNESS_COMMAND;
    buffer[2] = percent;
    buffer
}
