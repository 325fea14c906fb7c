// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! This module implements QR code decoding using the rqrr crate.
//! Frames arrive as luminance planes, are optionally downscaled, and
//! the first grid that decodes wins.

use crate::constants::DEFAULT_MAX_DECODE_DIMENSION;
use crate::frame_processor::types::{LumaFrame, SymbolFormat};
use crate::frame_processor::FrameDecoder;
use tracing::{debug, trace};

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling.
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    /// Create a new QR detector with default settings
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DECODE_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl FrameDecoder for QrDetector {
    fn decode(&mut self, frame: &LumaFrame<'_>) -> Option<String> {
        detect_sync(frame, self.max_dimension)
    }

    fn formats(&self) -> &[SymbolFormat] {
        &[SymbolFormat::Qr]
    }
}

/// Synchronous QR decode
fn detect_sync(frame: &LumaFrame<'_>, max_dimension: u32) -> Option<String> {
    let start = std::time::Instant::now();

    let width = frame.width();
    let height = frame.height();

    let mut prepared = if width > max_dimension || height > max_dimension {
        let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
        let new_width = ((width as f32 / scale) as u32).max(1);
        let new_height = ((height as f32 / scale) as u32).max(1);

        let downscaled = downscale_luma(frame, new_width, new_height);
        let row = new_width as usize;
        trace!(new_width, new_height, scale, "Downscaled luma for decoding");
        rqrr::PreparedImage::prepare_from_greyscale(
            new_width as usize,
            new_height as usize,
            |x, y| downscaled[y * row + x],
        )
    } else {
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            frame.pixel(x, y)
        })
    };

    let grids = prepared.detect_grids();
    trace!(
        count = grids.len(),
        detection_ms = start.elapsed().as_millis(),
        "QR grid detection complete"
    );

    for grid in grids {
        match grid.decode() {
            Ok((_meta, content)) => {
                debug!(
                    content = %content,
                    total_ms = start.elapsed().as_millis(),
                    "Decoded QR code"
                );
                return Some(content);
            }
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR grid");
            }
        }
    }

    None
}

/// Downscale a luma plane using bilinear interpolation
fn downscale_luma(frame: &LumaFrame<'_>, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = frame.width() as usize;
    let src_height = frame.height() as usize;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = (src_x as usize).min(src_width - 1);
            let y0 = (src_y as usize).min(src_height - 1);
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let p00 = frame.pixel(x0, y0) as f32;
            let p01 = frame.pixel(x1, y0) as f32;
            let p10 = frame.pixel(x0, y1) as f32;
            let p11 = frame.pixel(x1, y1) as f32;

            let value = p00 * (1.0 - x_frac) * (1.0 - y_frac)
                + p01 * x_frac * (1.0 - y_frac)
                + p10 * (1.0 - x_frac) * y_frac
                + p11 * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}
