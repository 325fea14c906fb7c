// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Requested capture resolution
///
/// Mirrors the preset names used by the host layer. Each preset maps to a
/// hardware quality tier; unsupported tiers fall through to lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionPreset {
    /// 320x240 class
    Low,
    /// 480p class
    Medium,
    /// 720p class (default, and the cap for preview surfaces)
    #[default]
    High,
    /// 1080p class
    VeryHigh,
    /// 2160p class
    UltraHigh,
    /// Highest quality the device reports
    Max,
}

impl ResolutionPreset {
    /// All presets ordered from lowest to highest
    pub const ALL: [ResolutionPreset; 6] = [
        ResolutionPreset::Low,
        ResolutionPreset::Medium,
        ResolutionPreset::High,
        ResolutionPreset::VeryHigh,
        ResolutionPreset::UltraHigh,
        ResolutionPreset::Max,
    ];

    /// Name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionPreset::Low => "low",
            ResolutionPreset::Medium => "medium",
            ResolutionPreset::High => "high",
            ResolutionPreset::VeryHigh => "veryHigh",
            ResolutionPreset::UltraHigh => "ultraHigh",
            ResolutionPreset::Max => "max",
        }
    }

    /// Parse a wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Clamp to the preview cap
    pub fn capped_for_preview(self) -> Self {
        self.min(PREVIEW_PRESET_CAP)
    }
}

impl std::fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ResolutionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown resolution preset: {}", s))
    }
}

/// Hardware quality tiers a device can advertise
///
/// `Low` is the baseline every device is expected to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProfileQuality {
    /// Baseline, lowest quality the device offers
    Low,
    /// 320x240
    Qvga,
    /// 720x480
    P480,
    /// 1280x720
    P720,
    /// 1920x1080
    P1080,
    /// 3840x2160
    P2160,
    /// Highest quality the device offers
    High,
}

impl ProfileQuality {
    /// Tier a preset starts searching from
    pub fn for_preset(preset: ResolutionPreset) -> Self {
        match preset {
            ResolutionPreset::Max => ProfileQuality::High,
            ResolutionPreset::UltraHigh => ProfileQuality::P2160,
            ResolutionPreset::VeryHigh => ProfileQuality::P1080,
            ResolutionPreset::High => ProfileQuality::P720,
            ResolutionPreset::Medium => ProfileQuality::P480,
            ResolutionPreset::Low => ProfileQuality::Qvga,
        }
    }

    /// Next tier to try when this one is unsupported
    pub fn next_lower(self) -> Option<Self> {
        match self {
            ProfileQuality::High => Some(ProfileQuality::P2160),
            ProfileQuality::P2160 => Some(ProfileQuality::P1080),
            ProfileQuality::P1080 => Some(ProfileQuality::P720),
            ProfileQuality::P720 => Some(ProfileQuality::P480),
            ProfileQuality::P480 => Some(ProfileQuality::Qvga),
            ProfileQuality::Qvga => Some(ProfileQuality::Low),
            ProfileQuality::Low => None,
        }
    }
}

/// Presets above this are clamped when sizing the preview surface
pub const PREVIEW_PRESET_CAP: ResolutionPreset = ResolutionPreset::High;

/// Frame reader buffer pool size
pub const DEFAULT_FRAME_READER_CAPACITY: usize = 2;

/// Frames larger than this (either dimension) are downscaled before decoding
pub const DEFAULT_MAX_DECODE_DIMENSION: u32 = 640;

/// Symbol formats used when the caller does not request any
pub const DEFAULT_SYMBOL_FORMATS: &[&str] = &["qr"];

/// Name of the hardware-callback thread
pub const CALLBACK_THREAD_NAME: &str = "camera-callbacks";

/// Name of the offloaded decode thread
pub const DECODE_THREAD_NAME: &str = "barcode-decode";

/// Virtual camera timing constants
pub mod virtual_camera {
    use super::Duration;

    /// Frame interval when streaming a still image (~30fps)
    pub const STILL_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

/// Supported image file extensions for still frame sources
pub mod file_formats {
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_names_round_trip() {
        for preset in ResolutionPreset::ALL {
            assert_eq!(ResolutionPreset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(ResolutionPreset::from_name("huge"), None);
    }

    #[test]
    fn preview_cap_never_exceeds_high() {
        for preset in ResolutionPreset::ALL {
            assert!(preset.capped_for_preview() <= ResolutionPreset::High);
        }
        assert_eq!(ResolutionPreset::Low.capped_for_preview(), ResolutionPreset::Low);
    }

    #[test]
    fn quality_chain_ends_at_baseline() {
        let mut quality = ProfileQuality::High;
        let mut steps = 0;
        while let Some(next) = quality.next_lower() {
            assert!(next < quality);
            quality = next;
            steps += 1;
        }
        assert_eq!(quality, ProfileQuality::Low);
        assert_eq!(steps, 6);
    }

    #[test]
    fn image_extensions() {
        assert!(file_formats::is_image_extension("PNG"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
