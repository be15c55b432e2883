//! Device handle: one opened panel and the operations it supports.

use crate::imaging::{self, ImageOptions};
use crate::model::{Capabilities, Model};
use crate::protocol::{image_frames, IdString};
use crate::transport::Transport;
use crate::{Error, Result};
use hidapi::{HidApi, HidDevice};
use image::DynamicImage;
use std::ffi::CStr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backlight brightness, either as a percentage or a fraction.
///
/// Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Brightness {
    /// Percent, clamped to 0-100.
    Percent(i64),
    /// Fraction, clamped to 0.0-1.0.
    Fraction(f64),
}

impl Brightness {
    /// Returns the byte sent to the device (0-100).
    pub fn to_percent(self) -> u8 {
        match self {
            Brightness::Percent(p) => p.clamp(0, 100) as u8,
            Brightness::Fraction(f) => (100.0 * f.clamp(0.0, 1.0)) as u8,
        }
    }
}

macro_rules! brightness_from {
    (Percent: $($t:ty),*) => {
        $(
            impl From<$t> for Brightness {
                fn from(value: $t) -> Self {
                    // Out-of-range values saturate; they clamp to 100 anyway
                    Brightness::Percent(i64::try_from(value).unwrap_or(i64::MAX))
                }
            }
        )*
    };
    (Fraction: $($t:ty),*) => {
        $(
            impl From<$t> for Brightness {
                fn from(value: $t) -> Self {
                    Brightness::Fraction(f64::from(value))
                }
            }
        )*
    };
}

brightness_from!(Percent: u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
brightness_from!(Fraction: f32, f64);

impl FromStr for Brightness {
    type Err = Error;

    /// `"40"` and `"40%"` are percentages, `"0.4"` is a fraction.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidBrightness(s.to_string());
        if let Some(percent) = s.strip_suffix('%') {
            percent.trim().parse().map(Brightness::Percent).map_err(|_| invalid())
        } else if s.contains('.') {
            s.parse().map(Brightness::Fraction).map_err(|_| invalid())
        } else {
            s.parse().map(Brightness::Percent).map_err(|_| invalid())
        }
    }
}

/// Pressed state of every key, indexed row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStates {
    states: Vec<bool>,
}

impl KeyStates {
    pub fn new(states: Vec<bool>) -> Self {
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns true if `key` is held down. Unknown keys read as released.
    pub fn is_pressed(&self, key: usize) -> bool {
        self.states.get(key).copied().unwrap_or(false)
    }

    /// Indices of the keys currently held down.
    pub fn pressed(&self) -> impl Iterator<Item = usize> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, &pressed)| pressed.then_some(i))
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.states
    }
}

/// Handle to a payload cached with [`DeviceHandle::register_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(usize);

impl ImageId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One panel: its capabilities and its exclusively owned connection.
///
/// The connection is released when the handle is closed or dropped. A
/// handle whose open failed exists but is not [`connected`](Self::connected);
/// every I/O operation on it returns [`Error::NotConnected`].
pub struct DeviceHandle<T: Transport = HidDevice> {
    caps: &'static Capabilities,
    path: String,
    transport: Option<T>,
    registered: Vec<Vec<u8>>,
    image_options: ImageOptions,
}

impl DeviceHandle<HidDevice> {
    /// Opens the device at `path`. A failed open yields a disconnected handle.
    pub fn open(api: &HidApi, caps: &'static Capabilities, path: &CStr) -> Self {
        let display_path = path.to_string_lossy().into_owned();
        let transport = match api.open_path(path) {
            Ok(device) => {
                info!("{} opened at path: {}", caps.name, display_path);
                Some(device)
            }
            Err(e) => {
                warn!("Failed to open {} at {}: {}", caps.name, display_path, e);
                None
            }
        };
        Self::new(caps, display_path, transport)
    }
}

impl<T: Transport> DeviceHandle<T> {
    /// Wraps an already opened transport (`None` for a failed open).
    pub fn new(caps: &'static Capabilities, path: impl Into<String>, transport: Option<T>) -> Self {
        Self {
            caps,
            path: path.into(),
            transport,
            registered: Vec::new(),
            image_options: ImageOptions::default(),
        }
    }

    /// Returns true if the underlying connection is open.
    pub fn connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Transport path the handle was created from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.caps
    }

    pub fn model(&self) -> Model {
        self.caps.model
    }

    /// Releases the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("Closed {} at {}", self.caps.name, self.path);
        }
    }

    pub fn image_options(&self) -> &ImageOptions {
        &self.image_options
    }

    /// Sets the options used when this handle encodes images.
    pub fn set_image_options(&mut self, options: ImageOptions) {
        self.image_options = options;
    }

    fn transport(&mut self) -> Result<&mut T> {
        self.transport
            .as_mut()
            .ok_or_else(|| Error::NotConnected(self.path.clone()))
    }

    fn check_key(&self, key: usize) -> Result<()> {
        let key_count = self.caps.key_count();
        if key >= key_count {
            return Err(Error::InvalidKey { key, key_count });
        }
        Ok(())
    }

    fn key_at(&self, row: usize, col: usize) -> Result<usize> {
        self.caps.key_index(row, col).ok_or_else(|| Error::InvalidKey {
            key: row.saturating_mul(self.caps.key_cols).saturating_add(col),
            key_count: self.caps.key_count(),
        })
    }

    /// Sends an encoded image payload to `key`.
    ///
    /// Stops at the first failed report write and returns its error.
    pub fn set_key_image(&mut self, key: usize, payload: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let caps = self.caps;
        let transport = self.transport()?;

        let mut pages = 0;
        for frame in image_frames(caps, key, payload) {
            transport.write(&frame).map_err(Error::Write)?;
            pages += 1;
        }

        debug!(
            "Key {} image sent ({} bytes, {} pages)",
            key,
            payload.len(),
            pages
        );
        Ok(())
    }

    /// Sends an encoded image payload to the key at `row`, `col`.
    pub fn set_key_image_at(&mut self, row: usize, col: usize, payload: &[u8]) -> Result<()> {
        let key = self.key_at(row, col)?;
        self.set_key_image(key, payload)
    }

    /// Fits, encodes and sends an image to `key`.
    pub fn set_key_image_dynamic(&mut self, key: usize, image: &DynamicImage) -> Result<()> {
        self.check_key(key)?;
        let payload = imaging::encode_key_image(image, self.caps, &self.image_options)?;
        self.set_key_image(key, &payload)
    }

    /// Loads an image file and sends it to `key`.
    pub fn set_key_image_file(&mut self, key: usize, path: impl AsRef<Path>) -> Result<()> {
        self.check_key(key)?;
        let image = imaging::load(path)?;
        self.set_key_image_dynamic(key, &image)
    }

    /// Loads an image file and sends it to the key at `row`, `col`.
    pub fn set_key_image_file_at(
        &mut self,
        row: usize,
        col: usize,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let key = self.key_at(row, col)?;
        self.set_key_image_file(key, path)
    }

    /// Fills `key` with a solid color.
    pub fn fill_key(&mut self, key: usize, color: [u8; 3]) -> Result<()> {
        self.check_key(key)?;
        let payload = imaging::solid_key_image(self.caps, color, &self.image_options)?;
        self.set_key_image(key, &payload)
    }

    /// Fills `key` with the background color.
    pub fn clear_key(&mut self, key: usize) -> Result<()> {
        self.fill_key(key, self.image_options.background)
    }

    /// Encodes an image once and keeps the payload for reuse.
    pub fn register_image(&mut self, image: &DynamicImage) -> Result<ImageId> {
        let payload = imaging::encode_key_image(image, self.caps, &self.image_options)?;
        self.registered.push(payload);
        Ok(ImageId(self.registered.len() - 1))
    }

    /// Loads, encodes and registers an image file.
    pub fn register_image_file(&mut self, path: impl AsRef<Path>) -> Result<ImageId> {
        let image = imaging::load(path)?;
        self.register_image(&image)
    }

    /// Sends a registered image to `key`.
    pub fn set_key_image_registered(&mut self, key: usize, id: ImageId) -> Result<()> {
        self.check_key(key)?;
        let payload = self
            .registered
            .get(id.0)
            .ok_or(Error::UnknownImage(id.0))?
            .clone();
        self.set_key_image(key, &payload)
    }

    /// Sends a registered image to the key at `row`, `col`.
    pub fn set_key_image_registered_at(&mut self, row: usize, col: usize, id: ImageId) -> Result<()> {
        let key = self.key_at(row, col)?;
        self.set_key_image_registered(key, id)
    }

    /// Restores the factory logo.
    pub fn reset(&mut self) -> Result<()> {
        let report = self.caps.generation.reset_report();
        self.transport()?
            .send_feature_report(&report)
            .map_err(Error::Write)?;
        debug!("Reset {}", self.caps.name);
        Ok(())
    }

    /// Sets the backlight brightness.
    pub fn set_brightness(&mut self, brightness: impl Into<Brightness>) -> Result<()> {
        let percent = brightness.into().to_percent();
        let report = self.caps.generation.brightness_report(percent);
        self.transport()?
            .send_feature_report(&report)
            .map_err(Error::Write)?;
        debug!("Brightness set to {}%", percent);
        Ok(())
    }

    fn key_state_buffer(&self) -> Vec<u8> {
        vec![0u8; self.caps.generation.key_state_report_length(self.caps.key_count())]
    }

    /// Blocks until the next key report and decodes it.
    pub fn read_key_states(&mut self) -> Result<KeyStates> {
        let mut buf = self.key_state_buffer();
        let n = self.transport()?.read(&mut buf).map_err(Error::Read)?;
        Ok(self.decode_key_states(&buf[..n]))
    }

    /// Waits at most `timeout` for a key report; `None` if nothing arrived.
    pub fn read_key_states_timeout(&mut self, timeout: Duration) -> Result<Option<KeyStates>> {
        let mut buf = self.key_state_buffer();
        let n = self
            .transport()?
            .read_timeout(&mut buf, timeout)
            .map_err(Error::Read)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.decode_key_states(&buf[..n])))
    }

    fn decode_key_states(&self, report: &[u8]) -> KeyStates {
        KeyStates::new(
            self.caps
                .generation
                .decode_key_states(report, self.caps.key_count()),
        )
    }

    fn read_id_string(&mut self, id: IdString) -> Result<String> {
        let generation = self.caps.generation;
        let mut buf = generation.identification_request(id);
        let n = self
            .transport()?
            .get_feature_report(&mut buf)
            .map_err(Error::Read)?;
        Ok(generation.parse_identification(id, &buf[..n.min(buf.len())]))
    }

    /// Reads the serial number; empty if the device returned too little.
    pub fn serial_number(&mut self) -> Result<String> {
        self.read_id_string(IdString::SerialNumber)
    }

    /// Reads the firmware version; empty if the device returned too little.
    pub fn firmware_version(&mut self) -> Result<String> {
        self.read_id_string(IdString::FirmwareVersion)
    }
}

impl<T: Transport> std::fmt::Debug for DeviceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("model", &self.caps.model)
            .field("path", &self.path)
            .field("connected", &self.connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn handle(model: Model) -> DeviceHandle<MockTransport> {
        DeviceHandle::new(model.capabilities(), "mock", Some(MockTransport::default()))
    }

    fn mock(device: &DeviceHandle<MockTransport>) -> &MockTransport {
        device.transport.as_ref().unwrap()
    }

    fn mock_mut(device: &mut DeviceHandle<MockTransport>) -> &mut MockTransport {
        device.transport.as_mut().unwrap()
    }

    #[test]
    fn test_brightness_clamping() {
        assert_eq!(Brightness::from(150).to_percent(), 100);
        assert_eq!(Brightness::from(-5).to_percent(), 0);
        assert_eq!(Brightness::from(42u8).to_percent(), 42);
        assert_eq!(Brightness::from(1.5).to_percent(), 100);
        assert_eq!(Brightness::from(-0.5).to_percent(), 0);
        assert_eq!(Brightness::from(0.5f32).to_percent(), 50);
        assert_eq!(Brightness::from(70usize).to_percent(), 70);
        assert_eq!(Brightness::from(u64::MAX).to_percent(), 100);
        assert_eq!(Brightness::from(-3i8).to_percent(), 0);
        assert_eq!(Brightness::from(55i16).to_percent(), 55);
    }

    #[test]
    fn test_brightness_from_str() {
        assert_eq!("40".parse::<Brightness>().unwrap(), Brightness::Percent(40));
        assert_eq!("40%".parse::<Brightness>().unwrap(), Brightness::Percent(40));
        assert_eq!("0.25".parse::<Brightness>().unwrap(), Brightness::Fraction(0.25));
        assert!("bright".parse::<Brightness>().is_err());
    }

    #[test]
    fn test_invalid_key_no_writes() {
        let mut device = handle(Model::Xl);
        let err = device.set_key_image(32, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { key: 32, key_count: 32 }));
        assert!(mock(&device).writes.is_empty());
    }

    #[test]
    fn test_set_key_image_writes_frames() {
        let mut device = handle(Model::OriginalV2);
        let payload = vec![0xAB; 2050];
        device.set_key_image(14, &payload).unwrap();

        let writes = &mock(&device).writes;
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|w| w.len() == 1024));
        assert!(writes.iter().all(|w| w[2] == 14));
    }

    #[test]
    fn test_set_key_image_stops_on_failure() {
        let mut device = handle(Model::Mini);
        mock_mut(&mut device).fail_write_at = Some(1);
        let payload = vec![0x11; 5000];
        let err = device.set_key_image(0, &payload).unwrap_err();
        assert!(matches!(err, Error::Write(_)));
        assert_eq!(mock(&device).writes.len(), 1);
    }

    #[test]
    fn test_set_key_image_at() {
        let mut device = handle(Model::Mini);
        device.set_key_image_at(1, 2, &[1]).unwrap();
        assert_eq!(mock(&device).writes[0][5], 6);

        let err = device.set_key_image_at(0, 3, &[1]).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
        assert_eq!(mock(&device).writes.len(), 1);
    }

    #[test]
    fn test_set_key_image_at_huge_position() {
        let mut device = handle(Model::Mini);
        let err = device.set_key_image_at(usize::MAX, 0, &[1]).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { key: usize::MAX, key_count: 6 }));
        let err = device.set_key_image_at(1, usize::MAX, &[1]).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { key: usize::MAX, .. }));
        assert!(mock(&device).writes.is_empty());
    }

    #[test]
    fn test_registered_images() {
        let mut device = handle(Model::Mini);
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let id = device.register_image(&image).unwrap();
        assert_eq!(id.index(), 0);
        device.set_key_image_registered(2, id).unwrap();
        assert!(!mock(&device).writes.is_empty());

        let err = device.set_key_image_registered(2, ImageId(7)).unwrap_err();
        assert!(matches!(err, Error::UnknownImage(7)));
    }

    #[test]
    fn test_fill_key_sends_bmp() {
        let mut device = handle(Model::Original);
        device.fill_key(0, [255, 0, 0]).unwrap();
        let writes = &mock(&device).writes;
        // 72x72 BMP fits in two 8191-byte reports
        assert_eq!(writes.len(), 2);
        assert_eq!(&writes[0][16..18], b"BM");
        assert_eq!(writes[1][4], 1);
    }

    #[test]
    fn test_reset_and_brightness_reports() {
        let mut device = handle(Model::Mini);
        device.reset().unwrap();
        device.set_brightness(150).unwrap();
        device.set_brightness(0.3).unwrap();

        let reports = &mock(&device).feature_reports;
        assert_eq!(reports[0].len(), 17);
        assert_eq!(&reports[0][..2], &[0x0B, 0x63]);
        assert_eq!(&reports[1][..6], &[0x05, 0x55, 0xAA, 0xD1, 0x01, 100]);
        assert_eq!(reports[2][5], 30);

        let mut device = handle(Model::Xl);
        device.reset().unwrap();
        device.set_brightness(-5).unwrap();
        let reports = &mock(&device).feature_reports;
        assert_eq!(reports[0].len(), 32);
        assert_eq!(&reports[0][..2], &[0x03, 0x02]);
        assert_eq!(&reports[1][..3], &[0x03, 0x08, 0]);
    }

    #[test]
    fn test_read_key_states() {
        let mut device = handle(Model::Mini);
        mock_mut(&mut device)
            .input_reports
            .push_back(vec![0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]);
        let states = device.read_key_states().unwrap();
        assert_eq!(states.len(), 6);
        assert_eq!(states.pressed().collect::<Vec<_>>(), vec![1, 5]);
        assert!(states.is_pressed(5));
        assert!(!states.is_pressed(6));
    }

    #[test]
    fn test_read_key_states_timeout() {
        let mut device = handle(Model::Xl);
        assert_eq!(
            device
                .read_key_states_timeout(Duration::from_millis(10))
                .unwrap(),
            None
        );

        let mut report = vec![0x01, 0x00, 0x20, 0x00];
        report.extend(std::iter::repeat(0).take(32));
        report[4 + 31] = 1;
        mock_mut(&mut device).input_reports.push_back(report);
        let states = device
            .read_key_states_timeout(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        assert_eq!(states.pressed().collect::<Vec<_>>(), vec![31]);
    }

    #[test]
    fn test_read_error() {
        let mut device = handle(Model::Mini);
        mock_mut(&mut device).fail_reads = true;
        assert!(matches!(device.read_key_states(), Err(Error::Read(_))));
    }

    #[test]
    fn test_identification_strings() {
        let mut device = handle(Model::Mini);
        let mut serial = vec![0x03, 0, 0, 0, 0];
        serial.extend_from_slice(b"BL17H1A01234\0\0\0\0");
        mock_mut(&mut device).feature_responses.push_back(serial);
        mock_mut(&mut device)
            .feature_responses
            .push_back(vec![0x04, 0, 0, 0, 0]);

        assert_eq!(device.serial_number().unwrap(), "BL17H1A01234");
        assert_eq!(device.firmware_version().unwrap(), "");
        assert_eq!(mock(&device).feature_requests, vec![0x03, 0x04]);
    }

    #[test]
    fn test_not_connected() {
        let mut device: DeviceHandle<MockTransport> =
            DeviceHandle::new(Model::Xl.capabilities(), "/dev/hidraw9", None);
        assert!(!device.connected());
        assert!(matches!(device.reset(), Err(Error::NotConnected(_))));
        assert!(matches!(
            device.set_key_image(0, &[]),
            Err(Error::NotConnected(_))
        ));
        // Key validation still happens first
        assert!(matches!(
            device.set_key_image(99, &[]),
            Err(Error::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut device = handle(Model::Mini);
        assert!(device.connected());
        device.close();
        device.close();
        assert!(!device.connected());
        assert!(matches!(
            device.serial_number(),
            Err(Error::NotConnected(_))
        ));
    }
}
