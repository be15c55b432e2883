//! Key image preparation.
//!
//! Turns an arbitrary image into the byte payload a model expects: flipped
//! per the model, scaled to fit, letterboxed, and encoded as BMP or JPEG.

use crate::model::{Capabilities, ImageFormat};
use crate::Result;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;
use tracing::debug;

/// Encoding options for key images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Letterbox and transparency fill color.
    pub background: [u8; 3],
    /// JPEG quality (1-100), used by JPEG models only.
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            background: [0, 0, 0],
            jpeg_quality: 90,
        }
    }
}

/// Decodes an image file.
pub fn load(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let image = image::open(path)?;
    debug!(
        "Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Fits `image` into a key of the given model.
///
/// The image is mirrored according to the model, scaled down or up to fit
/// while keeping its aspect ratio, and centered on the background color.
pub fn fit(image: &DynamicImage, caps: &Capabilities, options: &ImageOptions) -> RgbaImage {
    let (width, height) = (caps.pixel_width, caps.pixel_height);

    let mut oriented = image.clone();
    if caps.hflip {
        oriented = oriented.fliph();
    }
    if caps.vflip {
        oriented = oriented.flipv();
    }

    let scaled = oriented.resize(width, height, FilterType::Triangle).to_rgba8();

    let [r, g, b] = options.background;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 0xFF]));
    let x = width.saturating_sub(scaled.width()) / 2;
    let y = height.saturating_sub(scaled.height()) / 2;
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
    canvas
}

/// Encodes a fitted key image into the model's native format.
pub fn encode(canvas: &RgbaImage, caps: &Capabilities, options: &ImageOptions) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut out = Vec::new();
    match caps.image_format {
        ImageFormat::Bmp => rgb.write_with_encoder(BmpEncoder::new(&mut out))?,
        ImageFormat::Jpeg => {
            let quality = options.jpeg_quality.clamp(1, 100);
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?
        }
    }
    debug!(
        "Encoded {}x{} key image as {:?} ({} bytes)",
        caps.pixel_width,
        caps.pixel_height,
        caps.image_format,
        out.len()
    );
    Ok(out)
}

/// Produces a ready-to-send payload for `image`.
pub fn encode_key_image(
    image: &DynamicImage,
    caps: &Capabilities,
    options: &ImageOptions,
) -> Result<Vec<u8>> {
    encode(&fit(image, caps, options), caps, options)
}

/// Produces a payload filling the whole key with one color.
pub fn solid_key_image(caps: &Capabilities, color: [u8; 3], options: &ImageOptions) -> Result<Vec<u8>> {
    let [r, g, b] = color;
    let canvas = RgbaImage::from_pixel(caps.pixel_width, caps.pixel_height, Rgba([r, g, b, 0xFF]));
    encode(&canvas, caps, options)
}

/// Parses a `#RRGGBB` hex color string.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    Some([r, g, b])
}
