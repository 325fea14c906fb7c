// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning an image file through the full session pipeline

use camera_scanner::backends::camera::{CameraPlatform, DecodeMode, TextureRegistry};
use camera_scanner::backends::virtual_camera::{VirtualCamera, default_devices};
use camera_scanner::bridge::{AlwaysGranted, InitializeArgs};
use camera_scanner::constants::virtual_camera::STILL_FRAME_INTERVAL;
use camera_scanner::{Config, HostNotification, MethodCall, ResolutionPreset, ScannerHost, SessionDeps};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Arguments of the `scan` command
pub struct ScanOptions {
    pub image: PathBuf,
    pub camera: String,
    pub preset: Option<ResolutionPreset>,
    pub formats: Vec<String>,
    pub offload: bool,
    pub timeout: Option<u64>,
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = VirtualCamera::default().enumerate_cameras()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        let facing = camera
            .lens_facing
            .map(|facing| format!("{:?}", facing).to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  [{}] {} facing, sensor rotated {}°",
            camera.name, facing, camera.sensor_orientation
        );
    }

    Ok(())
}

/// Decode `options.image` through a scan session and print the result
pub fn scan(options: ScanOptions, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_scan(options, config))
}

async fn run_scan(options: ScanOptions, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let camera = VirtualCamera::streaming(default_devices(), STILL_FRAME_INTERVAL);
    camera.show_image(&options.camera, &options.image)?;

    let mut settings = config.session_settings();
    if options.offload {
        settings.decode_mode = DecodeMode::Offloaded;
    }

    let deps = SessionDeps::new(Arc::new(camera), Arc::new(TextureRegistry::new()));
    let host = ScannerHost::new(deps, settings, Arc::new(AlwaysGranted));
    let mut notifications = host
        .take_notifications()
        .ok_or("Notification channel already taken")?;

    let code_formats = if options.formats.is_empty() {
        config.default_formats.clone()
    } else {
        options.formats
    };
    let reply = host
        .handle(MethodCall::Initialize(InitializeArgs {
            camera_name: options.camera.clone(),
            resolution_preset: options.preset.unwrap_or(config.default_preset),
            enable_audio: false,
            code_formats,
        }))
        .await?;
    eprintln!(
        "Scanning with camera {} (preview {}x{})",
        options.camera, reply["previewWidth"], reply["previewHeight"]
    );

    let timeout = options
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.scan_timeout());
    let outcome = tokio::time::timeout(timeout, notifications.recv()).await;
    host.handle(MethodCall::Dispose).await?;

    match outcome {
        Ok(Some(HostNotification::ScanSuccess(text))) => {
            println!("{}", text);
            Ok(())
        }
        Ok(None) => Err("Scan session ended without a result".into()),
        Err(_) => Err(format!("No code found within {}s", timeout.as_secs()).into()),
    }
}
