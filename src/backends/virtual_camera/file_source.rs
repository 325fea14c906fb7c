// SPDX-License-Identifier: GPL-3.0-only

//! Still images as virtual camera scenes

use crate::backends::camera::types::{BackendError, BackendResult};
use crate::constants::file_formats;
use crate::frame_processor::OwnedLumaFrame;
use image::DynamicImage;
use std::path::Path;
use tracing::info;

/// Load an image file and convert it to 8-bit luminance
pub fn load_image_as_luma(path: &Path) -> BackendResult<OwnedLumaFrame> {
    info!(path = %path.display(), "Loading image file");

    if let Some(ext) = path.extension().and_then(|ext| ext.to_str())
        && !file_formats::is_image_extension(ext)
    {
        return Err(BackendError::Other(format!(
            "Unsupported image type '{}': {}",
            ext,
            path.display()
        )));
    }

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let frame = luma_from_image(&img);
    info!(width = frame.width, height = frame.height, "Image loaded successfully");
    Ok(frame)
}

/// Convert a decoded image to a tightly packed luminance frame
pub fn luma_from_image(img: &DynamicImage) -> OwnedLumaFrame {
    let gray = img.to_luma8();
    let width = gray.width();
    let height = gray.height();
    OwnedLumaFrame {
        data: gray.into_raw(),
        width,
        height,
    }
}
