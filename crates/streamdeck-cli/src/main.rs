//! Stream Deck Control Tool
//!
//! CLI for driving USB Stream Deck panels directly over HID.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamdeck_hw::{parse_hex_color, Brightness, DeviceHandle, KeyStates, Registry};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "streamdeckctl")]
#[command(about = "Control tool for USB Stream Deck panels")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Panel index as shown by `list` (overrides the configuration)
    #[arg(short, long)]
    device: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached panels
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show panel geometry and identification
    Info,
    /// Show an image file on a key
    Image {
        /// Image file (any format the image crate decodes)
        file: PathBuf,

        #[command(flatten)]
        target: KeyArgs,
    },
    /// Fill keys with a solid color
    Clear {
        #[command(flatten)]
        target: KeyArgs,

        /// Apply to every key
        #[arg(long, conflicts_with_all = ["key", "row", "col"])]
        all: bool,

        /// Color in hex format (defaults to the configured background)
        #[arg(long)]
        color: Option<String>,
    },
    /// Restore the factory logo
    Reset,
    /// Set backlight brightness
    Brightness {
        /// Percent (e.g. 40 or 40%) or fraction (e.g. 0.4)
        value: String,
    },
    /// Print key presses and releases until interrupted
    Watch {
        /// Poll timeout in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_ms: Option<u64>,
    },
    /// Write the effective configuration to a TOML file
    SaveConfig {
        /// Output file path
        output: PathBuf,
    },
}

/// Key selection, by index or by grid position.
#[derive(Args)]
struct KeyArgs {
    /// Key index (row-major, zero based)
    #[arg(short, long, conflicts_with_all = ["row", "col"])]
    key: Option<usize>,

    /// Key row (zero based)
    #[arg(long, requires = "col")]
    row: Option<usize>,

    /// Key column (zero based)
    #[arg(long, requires = "row")]
    col: Option<usize>,
}

impl KeyArgs {
    /// Resolves to a key index on `device`.
    fn resolve(&self, device: &DeviceHandle) -> Result<usize> {
        let caps = device.capabilities();
        match (self.key, self.row, self.col) {
            (Some(key), _, _) => Ok(key),
            (None, Some(row), Some(col)) => caps.key_index(row, col).with_context(|| {
                format!(
                    "Position ({}, {}) is outside the {}x{} key grid",
                    row, col, caps.key_rows, caps.key_cols
                )
            }),
            _ => anyhow::bail!("Specify --key or both --row and --col"),
        }
    }
}

#[derive(Serialize)]
struct PanelInfo {
    index: usize,
    model: String,
    name: &'static str,
    path: String,
    connected: bool,
    serial_number: Option<String>,
    firmware_version: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };

    if let Commands::SaveConfig { output } = &cli.command {
        config.save(output)?;
        println!("Configuration saved to: {}", output.display());
        return Ok(());
    }

    // Device I/O is blocking; run it off the runtime so Ctrl-C stays responsive
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let mut worker = tokio::task::spawn_blocking(move || run(cli, config, &worker_stop));

    tokio::select! {
        result = &mut worker => result.context("Device worker panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, stopping");
            stop.store(true, Ordering::Relaxed);
            worker.await.context("Device worker panicked")?
        }
    }
}

fn run(cli: Cli, config: Config, stop: &AtomicBool) -> Result<()> {
    let mut registry = Registry::new().context("Failed to initialize USB HID")?;

    if let Commands::List { json } = cli.command {
        return handle_list(&mut registry, json);
    }

    let index = cli.device.unwrap_or(config.device);
    let found = registry.len();
    let device = registry
        .get_mut(index)
        .with_context(|| format!("No panel at index {} ({} found)", index, found))?;
    if !device.connected() {
        anyhow::bail!(
            "Panel {} ({}) at {} could not be opened. Check permissions.",
            index,
            device.capabilities().name,
            device.path()
        );
    }
    device.set_image_options(config.image.options()?);

    match cli.command {
        Commands::List { .. } | Commands::SaveConfig { .. } => unreachable!("handled above"),
        Commands::Info => handle_info(device),
        Commands::Image { file, target } => {
            let key = target.resolve(device)?;
            device
                .set_key_image_file(key, &file)
                .with_context(|| format!("Failed to show {} on key {}", file.display(), key))?;
            println!("Key {} set to: {}", key, file.display());
            Ok(())
        }
        Commands::Clear { target, all, color } => handle_clear(device, &target, all, color),
        Commands::Reset => {
            device.reset()?;
            println!("Panel reset");
            Ok(())
        }
        Commands::Brightness { value } => {
            let brightness: Brightness = value.parse()?;
            device.set_brightness(brightness)?;
            println!("Brightness set to: {}%", brightness.to_percent());
            Ok(())
        }
        Commands::Watch { timeout_ms } => {
            let timeout = match timeout_ms {
                Some(ms) => Duration::from_millis(ms),
                None => config.poll_timeout()?,
            };
            handle_watch(device, timeout, stop)
        }
    }
}

fn handle_list(registry: &mut Registry, json: bool) -> Result<()> {
    let mut panels = Vec::with_capacity(registry.len());
    for (index, device) in registry.iter_mut().enumerate() {
        let (serial_number, firmware_version) = if device.connected() {
            let serial = device
                .serial_number()
                .map_err(|e| warn!("Failed to read serial number: {}", e))
                .ok();
            let firmware = device
                .firmware_version()
                .map_err(|e| warn!("Failed to read firmware version: {}", e))
                .ok();
            (serial, firmware)
        } else {
            (None, None)
        };

        panels.push(PanelInfo {
            index,
            model: device.model().to_string(),
            name: device.capabilities().name,
            path: device.path().to_string(),
            connected: device.connected(),
            serial_number,
            firmware_version,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&panels)?);
        return Ok(());
    }

    if panels.is_empty() {
        println!("No panels found");
        return Ok(());
    }

    for panel in panels {
        println!("[{}] {} ({})", panel.index, panel.name, panel.model);
        println!("  Path: {}", panel.path);
        println!("  Connected: {}", if panel.connected { "yes" } else { "no" });
        if let Some(serial) = panel.serial_number {
            println!("  Serial number: {}", serial);
        }
        if let Some(firmware) = panel.firmware_version {
            println!("  Firmware: {}", firmware);
        }
    }

    Ok(())
}

fn handle_info(device: &mut DeviceHandle) -> Result<()> {
    let caps = device.capabilities();
    let serial = device.serial_number()?;
    let firmware = device.firmware_version()?;

    println!("{}:", caps.name);
    println!("  Path: {}", device.path());
    println!("  Keys: {} ({}x{})", caps.key_count(), caps.key_cols, caps.key_rows);
    println!("  Key size: {}x{} px", caps.pixel_width, caps.pixel_height);
    println!("  Image format: {:?}", caps.image_format);
    println!("  Protocol: {:?}", caps.generation);
    println!("  Serial number: {}", serial);
    println!("  Firmware: {}", firmware);
    Ok(())
}

fn handle_clear(
    device: &mut DeviceHandle,
    target: &KeyArgs,
    all: bool,
    color: Option<String>,
) -> Result<()> {
    let color = match color {
        Some(hex) => {
            parse_hex_color(&hex).with_context(|| format!("Invalid color: {}", hex))?
        }
        None => device.image_options().background,
    };

    let keys: Vec<usize> = if all {
        (0..device.capabilities().key_count()).collect()
    } else {
        vec![target.resolve(device)?]
    };

    for &key in &keys {
        device.fill_key(key, color)?;
    }
    println!("Cleared {} key(s)", keys.len());
    Ok(())
}

fn handle_watch(device: &mut DeviceHandle, timeout: Duration, stop: &AtomicBool) -> Result<()> {
    println!("Watching keys on {} (Ctrl-C to stop)", device.capabilities().name);

    let mut previous = KeyStates::new(vec![false; device.capabilities().key_count()]);
    while !stop.load(Ordering::Relaxed) {
        let Some(states) = device.read_key_states_timeout(timeout)? else {
            continue;
        };

        for key in 0..states.len() {
            match (previous.is_pressed(key), states.is_pressed(key)) {
                (false, true) => println!("Key {} pressed", key),
                (true, false) => println!("Key {} released", key),
                _ => {}
            }
        }
        previous = states;
    }

    Ok(())
}
