// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use camera_scanner::constants::{PREVIEW_PRESET_CAP, ProfileQuality, ResolutionPreset};

#[test]
fn test_resolution_preset_values() {
    // Low, Medium, High, VeryHigh, UltraHigh, Max
    assert_eq!(ResolutionPreset::ALL.len(), 6);
}

#[test]
fn test_resolution_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    for pair in ResolutionPreset::ALL.windows(2) {
        assert!(pair[0] < pair[1], "{} should sort below {}", pair[0], pair[1]);
        assert!(
            ProfileQuality::for_preset(pair[0]) < ProfileQuality::for_preset(pair[1]),
            "Quality tiers should follow preset order"
        );
    }
}

#[test]
fn test_resolution_preset_names_round_trip() {
    for preset in ResolutionPreset::ALL {
        assert_eq!(ResolutionPreset::from_name(preset.name()), Some(preset));
        assert_eq!(preset.name().parse::<ResolutionPreset>(), Ok(preset));
    }
    assert!("huge".parse::<ResolutionPreset>().is_err());
}

#[test]
fn test_preview_cap() {
    assert_eq!(PREVIEW_PRESET_CAP, ResolutionPreset::High);
    assert_eq!(
        ResolutionPreset::Max.capped_for_preview(),
        ResolutionPreset::High
    );
    assert_eq!(
        ResolutionPreset::Low.capped_for_preview(),
        ResolutionPreset::Low
    );
}

#[test]
fn test_quality_fallback_reaches_baseline() {
    let mut quality = ProfileQuality::High;
    let mut steps = 0;
    while let Some(lower) = quality.next_lower() {
        assert!(lower < quality);
        quality = lower;
        steps += 1;
    }
    assert_eq!(quality, ProfileQuality::Low);
    assert_eq!(steps, 6);
}
