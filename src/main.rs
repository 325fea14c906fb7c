// SPDX-License-Identifier: GPL-3.0-only

use camera_scanner::Config;
use camera_scanner::ResolutionPreset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-scanner")]
#[command(about = "Live camera preview with barcode and QR decoding")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (default: ~/.config/camera-scanner/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Point a virtual camera at an image and decode it
    Scan {
        /// Image shown to the camera
        #[arg(short, long)]
        image: PathBuf,

        /// Camera name to use (from 'camera-scanner list')
        #[arg(short, long, default_value = "0")]
        camera: String,

        /// Resolution preset (low, medium, high, veryHigh, ultraHigh, max)
        #[arg(short, long)]
        preset: Option<ResolutionPreset>,

        /// Symbol format to look for, may be repeated (default: qr)
        #[arg(short, long = "format")]
        formats: Vec<String>,

        /// Decode on a dedicated thread
        #[arg(long)]
        offload: bool,

        /// Seconds to wait for a decode
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    // Initialize logging
    // RUST_LOG takes precedence over the config file's logFilter
    // Examples: RUST_LOG=debug, RUST_LOG=camera_scanner=trace
    let default_filter = config.log_filter.as_deref().unwrap_or("warn");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Scan {
            image,
            camera,
            preset,
            formats,
            offload,
            timeout,
        } => cli::scan(
            cli::ScanOptions {
                image,
                camera,
                preset,
                formats,
                offload,
                timeout,
            },
            &config,
        ),
    }
}
