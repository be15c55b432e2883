//! Report exchange with an opened HID device.

use hidapi::{HidDevice, HidResult};
use std::time::Duration;

/// Report-level access to one opened device.
///
/// Implemented for [`hidapi::HidDevice`]; the device handle only talks to
/// hardware through this trait.
pub trait Transport {
    /// Writes an output report. The first byte is the report id.
    fn write(&mut self, data: &[u8]) -> HidResult<usize>;

    /// Blocks until an input report arrives.
    fn read(&mut self, buf: &mut [u8]) -> HidResult<usize>;

    /// Blocks for at most `timeout`; returns 0 if nothing arrived.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> HidResult<usize>;

    /// Sends a feature report. The first byte is the report id.
    fn send_feature_report(&mut self, data: &[u8]) -> HidResult<()>;

    /// Fetches the feature report whose id is in `buf[0]`.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> HidResult<usize>;
}

impl Transport for HidDevice {
    fn write(&mut self, data: &[u8]) -> HidResult<usize> {
        HidDevice::write(self, data)
    }

    fn read(&mut self, buf: &mut [u8]) -> HidResult<usize> {
        HidDevice::read(self, buf)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> HidResult<usize> {
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        HidDevice::read_timeout(self, buf, millis)
    }

    fn send_feature_report(&mut self, data: &[u8]) -> HidResult<()> {
        HidDevice::send_feature_report(self, data)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> HidResult<usize> {
        HidDevice::get_feature_report(self, buf)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use hidapi::HidError;
    use std::collections::VecDeque;

    /// Records everything sent and serves scripted responses.
    #[derive(Default)]
    pub struct MockTransport {
        pub writes: Vec<Vec<u8>>,
        pub feature_reports: Vec<Vec<u8>>,
        pub feature_requests: Vec<u8>,
        pub input_reports: VecDeque<Vec<u8>>,
        pub feature_responses: VecDeque<Vec<u8>>,
        /// Fail the write with this zero-based index.
        pub fail_write_at: Option<usize>,
        pub fail_reads: bool,
    }

    pub fn hid_error(message: &str) -> HidError {
        HidError::HidApiError {
            message: message.to_string(),
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, data: &[u8]) -> HidResult<usize> {
            if self.fail_write_at == Some(self.writes.len()) {
                return Err(hid_error("write failed"));
            }
            self.writes.push(data.to_vec());
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> HidResult<usize> {
            self.read_timeout(buf, Duration::ZERO)
        }

        fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> HidResult<usize> {
            if self.fail_reads {
                return Err(hid_error("read failed"));
            }
            match self.input_reports.pop_front() {
                Some(report) => {
                    let n = report.len().min(buf.len());
                    buf[..n].copy_from_slice(&report[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        fn send_feature_report(&mut self, data: &[u8]) -> HidResult<()> {
            self.feature_reports.push(data.to_vec());
            Ok(())
        }

        fn get_feature_report(&mut self, buf: &mut [u8]) -> HidResult<usize> {
            self.feature_requests.push(buf[0]);
            let response = self
                .feature_responses
                .pop_front()
                .ok_or_else(|| hid_error("no feature report"))?;
            let n = response.len().min(buf.len());
            buf[..n].copy_from_slice(&response[..n]);
            Ok(n)
        }
    }
}
