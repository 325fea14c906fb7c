// SPDX-License-Identifier: GPL-3.0-only

//! Built-in symbol decoders

pub mod qr_detector;

pub use qr_detector::QrDetector;
