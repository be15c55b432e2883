//! Capability table for the supported panel models.
//!
//! Every model is described by an immutable [`Capabilities`] record. The
//! table is a static array; lookups never allocate.

use crate::protocol::Generation;
use crate::{Error, Result};
use std::str::FromStr;

/// Native key image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// 24-bit uncompressed bitmap.
    Bmp,
    /// Baseline JPEG.
    Jpeg,
}

/// Supported panel models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Original,
    OriginalV2,
    Mini,
    Xl,
}

/// Geometry and protocol parameters of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub model: Model,
    pub name: &'static str,
    pub product_id: u16,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub key_cols: usize,
    pub key_rows: usize,
    pub image_format: ImageFormat,
    /// Length of every image output report.
    pub report_length: usize,
    pub hflip: bool,
    pub vflip: bool,
    pub generation: Generation,
}

impl Capabilities {
    /// Number of keys (`cols * rows`).
    pub const fn key_count(&self) -> usize {
        self.key_cols * self.key_rows
    }

    /// Image bytes carried by one output report.
    pub fn payload_length(&self) -> usize {
        self.report_length - self.generation.image_header_length()
    }

    /// Row-major key index for a grid position, if the position exists.
    pub fn key_index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.key_rows && col < self.key_cols).then(|| row * self.key_cols + col)
    }
}

pub const PRODUCT_ORIGINAL: u16 = 0x0060;
pub const PRODUCT_ORIGINAL_V2: u16 = 0x006D;
pub const PRODUCT_MINI: u16 = 0x0063;
pub const PRODUCT_XL: u16 = 0x006C;

/// All known models.
pub static MODELS: [Capabilities; 4] = [
    Capabilities {
        model: Model::Original,
        name: "Stream Deck Original",
        product_id: PRODUCT_ORIGINAL,
        pixel_width: 72,
        pixel_height: 72,
        key_cols: 5,
        key_rows: 3,
        image_format: ImageFormat::Bmp,
        report_length: 8191,
        hflip: true,
        vflip: true,
        generation: Generation::Gen1,
    },
    Capabilities {
        model: Model::OriginalV2,
        name: "Stream Deck Original V2",
        product_id: PRODUCT_ORIGINAL_V2,
        pixel_width: 72,
        pixel_height: 72,
        key_cols: 5,
        key_rows: 3,
        image_format: ImageFormat::Jpeg,
        report_length: 1024,
        hflip: true,
        vflip: true,
        generation: Generation::Gen2,
    },
    Capabilities {
        model: Model::Mini,
        name: "Stream Deck Mini",
        product_id: PRODUCT_MINI,
        pixel_width: 80,
        pixel_height: 80,
        key_cols: 3,
        key_rows: 2,
        image_format: ImageFormat::Bmp,
        report_length: 1024,
        hflip: false,
        vflip: true,
        generation: Generation::Gen1,
    },
    Capabilities {
        model: Model::Xl,
        name: "Stream Deck XL",
        product_id: PRODUCT_XL,
        pixel_width: 96,
        pixel_height: 96,
        key_cols: 8,
        key_rows: 4,
        image_format: ImageFormat::Jpeg,
        report_length: 1024,
        hflip: true,
        vflip: true,
        generation: Generation::Gen2,
    },
];

/// Looks up the capabilities for a USB product id.
pub fn lookup(product_id: u16) -> Option<&'static Capabilities> {
    MODELS.iter().find(|caps| caps.product_id == product_id)
}

impl Model {
    /// Returns the capability record for this model.
    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            Model::Original => &MODELS[0],
            Model::OriginalV2 => &MODELS[1],
            Model::Mini => &MODELS[2],
            Model::Xl => &MODELS[3],
        }
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "original" => Ok(Model::Original),
            "original-v2" | "original_v2" => Ok(Model::OriginalV2),
            "mini" => Ok(Model::Mini),
            "xl" => Ok(Model::Xl),
            _ => Err(Error::UnknownModel(s.to_string())),
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Model::Original => write!(f, "original"),
            Model::OriginalV2 => write!(f, "original-v2"),
            Model::Mini => write!(f, "mini"),
            Model::Xl => write!(f, "xl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_mini() {
        let caps = lookup(PRODUCT_MINI).unwrap();
        assert_eq!(caps.model, Model::Mini);
        assert_eq!((caps.pixel_width, caps.pixel_height), (80, 80));
        assert_eq!((caps.key_cols, caps.key_rows), (3, 2));
        assert_eq!(caps.key_count(), 6);
        assert_eq!(caps.generation, Generation::Gen1);
        assert!(!caps.hflip);
        assert!(caps.vflip);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup(0x0000).is_none());
        assert!(lookup(0x0080).is_none());
    }

    #[test]
    fn test_table_values() {
        let original = lookup(PRODUCT_ORIGINAL).unwrap();
        assert_eq!(original.report_length, 8191);
        assert_eq!(original.image_format, ImageFormat::Bmp);
        assert_eq!(original.key_count(), 15);
        assert_eq!(original.payload_length(), 8191 - 16);

        let v2 = lookup(PRODUCT_ORIGINAL_V2).unwrap();
        assert_eq!(v2.report_length, 1024);
        assert_eq!(v2.image_format, ImageFormat::Jpeg);
        assert_eq!(v2.generation, Generation::Gen2);

        let xl = lookup(PRODUCT_XL).unwrap();
        assert_eq!((xl.pixel_width, xl.pixel_height), (96, 96));
        assert_eq!(xl.key_count(), 32);
        assert_eq!(xl.payload_length(), 1016);
    }

    #[test]
    fn test_capabilities_match_model() {
        for caps in MODELS.iter() {
            assert_eq!(caps.model.capabilities(), caps);
        }
    }

    #[test]
    fn test_key_index() {
        let xl = Model::Xl.capabilities();
        assert_eq!(xl.key_index(0, 0), Some(0));
        assert_eq!(xl.key_index(1, 2), Some(10));
        assert_eq!(xl.key_index(3, 7), Some(31));
        assert_eq!(xl.key_index(4, 0), None);
        assert_eq!(xl.key_index(0, 8), None);
        assert_eq!(xl.key_index(usize::MAX, 0), None);
        assert_eq!(xl.key_index(0, usize::MAX), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("mini".parse::<Model>().unwrap(), Model::Mini);
        assert_eq!("Original-V2".parse::<Model>().unwrap(), Model::OriginalV2);
        assert_eq!("xl".parse::<Model>().unwrap(), Model::Xl);
        assert!("plus".parse::<Model>().is_err());
        assert_eq!(Model::OriginalV2.to_string(), "original-v2");
    }
}
