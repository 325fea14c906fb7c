// SPDX-License-Identifier: GPL-3.0-only

//! Resolution profile selection
//!
//! Presets are mapped onto the quality tiers the device advertises. A tier the
//! device lacks falls through to the next lower one, then to the baseline
//! `Low` tier. Preview surfaces never use a tier above `high`.

use super::types::FrameSize;
use crate::constants::{ProfileQuality, ResolutionPreset};
use crate::errors::{SessionError, SessionResult};
use tracing::debug;

/// Capability query over the device's recording profiles
pub trait ProfileSource: Send + Sync {
    /// Frame size of `quality` on `camera_id`, `None` when unsupported
    fn profile(&self, camera_id: &str, quality: ProfileQuality) -> Option<FrameSize>;
}

/// Sizes negotiated for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// Frame reader size
    pub capture: FrameSize,
    /// Preview surface size
    pub preview: FrameSize,
}

/// Best available size for `preset`
pub fn resolve_preset<S: ProfileSource + ?Sized>(
    source: &S,
    camera_id: &str,
    preset: ResolutionPreset,
) -> SessionResult<FrameSize> {
    let mut quality = Some(ProfileQuality::for_preset(preset));
    while let Some(tier) = quality {
        if let Some(size) = source.profile(camera_id, tier) {
            debug!(camera_id, %preset, ?tier, %size, "Resolved capture profile");
            return Ok(size);
        }
        quality = tier.next_lower();
    }
    Err(SessionError::NoProfileAvailable(format!(
        "No capture profile available for camera {}",
        camera_id
    )))
}

/// Capture and preview sizes for `preset`
pub fn best_profile<S: ProfileSource + ?Sized>(
    source: &S,
    camera_id: &str,
    preset: ResolutionPreset,
) -> SessionResult<ResolvedProfile> {
    let capture = resolve_preset(source, camera_id, preset)?;
    let preview = resolve_preset(source, camera_id, preset.capped_for_preview())?;
    Ok(ResolvedProfile { capture, preview })
}
