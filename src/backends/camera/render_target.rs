// SPDX-License-Identifier: GPL-3.0-only

//! Render targets for the preview stream
//!
//! The host allocates a drawable surface per session and identifies it by an
//! opaque texture id. The session sizes it to the preview profile and
//! releases it on dispose.

use super::types::{FrameSize, Surface, SurfaceId, SurfaceKind};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// A drawable preview surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Identifier reported to the host
    pub texture_id: u64,
    pub surface: Surface,
}

impl RenderTarget {
    /// Set the default buffer size of the backing surface
    pub fn with_buffer_size(mut self, size: FrameSize) -> Self {
        self.surface.size = size;
        self
    }
}

/// Allocates and releases render targets
pub trait RenderTargetProvider: Send + Sync {
    fn create(&self) -> RenderTarget;

    fn release(&self, texture_id: u64);
}

/// In-process render target registry
///
/// Texture ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets created and not yet released
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, texture_id: u64) -> bool {
        self.live
            .lock()
            .map(|live| live.contains(&texture_id))
            .unwrap_or(false)
    }
}

impl RenderTargetProvider for TextureRegistry {
    fn create(&self) -> RenderTarget {
        let texture_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut live) = self.live.lock() {
            live.insert(texture_id);
        }
        debug!(texture_id, "Created render target");
        RenderTarget {
            texture_id,
            surface: Surface {
                // Reader surfaces use the upper half of the id space
                id: SurfaceId(texture_id),
                kind: SurfaceKind::Preview,
                size: FrameSize::new(0, 0),
            },
        }
    }

    fn release(&self, texture_id: u64) {
        let removed = self
            .live
            .lock()
            .map(|mut live| live.remove(&texture_id))
            .unwrap_or(false);
        if removed {
            debug!(texture_id, "Released render target");
        } else {
            warn!(texture_id, "Release of unknown render target");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_tracked() {
        let registry = TextureRegistry::new();
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a.texture_id, b.texture_id);
        assert_eq!(registry.live_count(), 2);

        registry.release(a.texture_id);
        assert!(!registry.is_live(a.texture_id));
        assert!(registry.is_live(b.texture_id));

        // double release is harmless
        registry.release(a.texture_id);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn buffer_size_applies_to_surface() {
        let target = TextureRegistry::new()
            .create()
            .with_buffer_size(FrameSize::new(1280, 720));
        assert_eq!(target.surface.size, FrameSize::new(1280, 720));
        assert_eq!(target.surface.kind, SurfaceKind::Preview);
    }
}
