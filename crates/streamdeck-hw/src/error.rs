//! Error types for the Stream Deck hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with the hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// The HID subsystem could not be initialized.
    #[error("Failed to initialize USB HID: {0}")]
    TransportInit(#[source] hidapi::HidError),

    /// Key index outside the panel's key grid.
    #[error("Invalid key {key} (panel has {key_count} keys)")]
    InvalidKey { key: usize, key_count: usize },

    /// Writing a report to the device failed.
    #[error("USB HID write error: {0}")]
    Write(#[source] hidapi::HidError),

    /// Reading a report from the device failed.
    #[error("USB HID read error: {0}")]
    Read(#[source] hidapi::HidError),

    /// The handle's connection was never opened or has been closed.
    #[error("Device not connected: {0}")]
    NotConnected(String),

    /// Decoding or encoding a key image failed.
    #[error("Image error: {0}")]
    Image(#[from] ::image::ImageError),

    /// Registered image id not known to this handle.
    #[error("Unknown registered image: {0}")]
    UnknownImage(usize),

    /// Brightness string that is neither a percent nor a fraction.
    #[error("Invalid brightness: {0}")]
    InvalidBrightness(String),

    /// Model name not in the capability table.
    #[error("Unknown model: {0}")]
    UnknownModel(String),
}
