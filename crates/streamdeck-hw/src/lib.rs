//! Stream Deck Hardware Library
//!
//! Provides hardware abstraction for multi-key LCD panels (Stream Deck
//! Original, Original V2, Mini and XL) driven over USB HID.

pub mod device;
pub mod error;
pub mod imaging;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use device::{Brightness, DeviceHandle, ImageId, KeyStates};
pub use error::{Error, Result};
pub use imaging::{parse_hex_color, ImageOptions};
pub use model::{Capabilities, ImageFormat, Model};
pub use protocol::Generation;
pub use registry::Registry;
pub use transport::Transport;

/// USB vendor id shared by all supported panels.
pub const VENDOR_ID: u16 = 0x0FD9;
