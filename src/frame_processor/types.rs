// SPDX-License-Identifier: MPL-2.0

//! Core types for frame decoding
//!
//! Luminance views handed to decoders and the symbol format table used to
//! translate host format names into decoder hints.

use crate::constants::DEFAULT_SYMBOL_FORMATS;
use crate::errors::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Borrowed single-channel brightness buffer
///
/// Only valid for the duration of a decode call; decoders copy what they
/// need to keep.
#[derive(Debug, Clone, Copy)]
pub struct LumaFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    row_stride: usize,
}

impl<'a> LumaFrame<'a> {
    /// Wrap a plane, rejecting empty or truncated buffers
    pub fn new(data: &'a [u8], width: u32, height: u32, row_stride: usize) -> Option<Self> {
        if width == 0 || height == 0 || row_stride < width as usize {
            return None;
        }
        let required = (height as usize - 1) * row_stride + width as usize;
        if data.len() < required {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            row_stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Brightness at (x, y); callers stay within bounds
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.row_stride + x]
    }

    /// Raw plane data including any row padding
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Copy into an owned, tightly packed frame
    pub fn to_owned_frame(&self) -> OwnedLumaFrame {
        OwnedLumaFrame {
            data: copy_luma_without_stride(self),
            width: self.width,
            height: self.height,
        }
    }
}

/// Tightly packed luminance frame that outlives its source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedLumaFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl OwnedLumaFrame {
    /// Borrow as a decoder input
    pub fn as_luma(&self) -> Option<LumaFrame<'_>> {
        LumaFrame::new(&self.data, self.width, self.height, self.width as usize)
    }
}

/// Copy luma rows without stride padding
fn copy_luma_without_stride(frame: &LumaFrame<'_>) -> Vec<u8> {
    let width = frame.width as usize;
    let height = frame.height as usize;

    let mut result = Vec::with_capacity(width * height);
    for y in 0..height {
        let row_start = y * frame.row_stride;
        result.extend_from_slice(&frame.data[row_start..row_start + width]);
    }
    result
}

/// Barcode symbologies a session can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolFormat {
    Codabar,
    Code39,
    Code93,
    Code128,
    Ean8,
    Ean13,
    Itf,
    UpcA,
    Aztec,
    DataMatrix,
    Pdf417,
    Qr,
}

const FORMAT_NAMES: [(&str, SymbolFormat); 12] = [
    ("codabar", SymbolFormat::Codabar),
    ("code39", SymbolFormat::Code39),
    ("code93", SymbolFormat::Code93),
    ("code128", SymbolFormat::Code128),
    ("ean8", SymbolFormat::Ean8),
    ("ean13", SymbolFormat::Ean13),
    ("itf", SymbolFormat::Itf),
    ("upca", SymbolFormat::UpcA),
    ("aztec", SymbolFormat::Aztec),
    ("datamatrix", SymbolFormat::DataMatrix),
    ("pdf417", SymbolFormat::Pdf417),
    ("qr", SymbolFormat::Qr),
];

fn format_table() -> &'static HashMap<&'static str, SymbolFormat> {
    static TABLE: OnceLock<HashMap<&'static str, SymbolFormat>> = OnceLock::new();
    TABLE.get_or_init(|| FORMAT_NAMES.into_iter().collect())
}

impl SymbolFormat {
    /// Look up a host format name
    pub fn from_name(name: &str) -> SessionResult<Self> {
        format_table()
            .get(name)
            .copied()
            .ok_or_else(|| SessionError::UnknownFormat(name.to_string()))
    }

    /// Host format name
    pub fn name(&self) -> &'static str {
        FORMAT_NAMES
            .iter()
            .find(|(_, format)| format == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

impl std::fmt::Display for SymbolFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the requested format names, defaulting to QR when none are given
///
/// Duplicates are collapsed; order of first appearance is kept.
pub fn resolve_formats<S: AsRef<str>>(names: &[S]) -> SessionResult<Vec<SymbolFormat>> {
    let mut formats = Vec::new();
    let requested: Vec<&str> = if names.is_empty() {
        DEFAULT_SYMBOL_FORMATS.to_vec()
    } else {
        names.iter().map(AsRef::as_ref).collect()
    };
    for name in requested {
        let format = SymbolFormat::from_name(name)?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}
