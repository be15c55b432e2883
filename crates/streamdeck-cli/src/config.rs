//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use streamdeck_hw::{parse_hex_color, ImageOptions};

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Registry index of the panel to control
    #[serde(default)]
    pub device: usize,

    /// Key poll timeout in milliseconds for `watch`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Key image configuration
    #[serde(default)]
    pub image: ImageConfig,
}

/// Key image encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Letterbox color in hex format
    #[serde(default = "default_background")]
    pub background: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            background: default_background(),
        }
    }
}

impl ImageConfig {
    /// Converts to library image options.
    pub fn options(&self) -> Result<ImageOptions> {
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            );
        }
        let background = parse_hex_color(&self.background)
            .with_context(|| format!("Invalid background color: {}", self.background))?;
        Ok(ImageOptions {
            background,
            jpeg_quality: self.jpeg_quality,
        })
    }
}

// Default value functions
fn default_poll_timeout() -> u64 {
    250
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_background() -> String {
    "#000000".to_string()
}

impl Config {
    /// Key poll timeout for `watch`. Zero would turn the poll into a busy loop.
    pub fn poll_timeout(&self) -> Result<Duration> {
        if self.poll_timeout_ms == 0 {
            anyhow::bail!("poll_timeout_ms must be at least 1");
        }
        Ok(Duration::from_millis(self.poll_timeout_ms))
    }

    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: 0,
            poll_timeout_ms: default_poll_timeout(),
            image: ImageConfig::default(),
        }
    }
}
