// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The platform camera stack is asynchronous: opening a device, configuring
//! a capture session and completing captures are all reported later through
//! [`PlatformCallbacks`]. This module defines the handle traits a platform
//! binding implements and the hardware-side pieces built on them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │  ← state machine, hardware-callback thread
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌──────────┐ ┌─────────────┐
//! │ Hardware │ │ CaptureLoop │  ← per-frame decode
//! │ Session  │ └─────────────┘
//! └────┬─────┘
//!      ▼
//! ┌─────────────────────┐
//! │ CameraPlatform trait│  ← device / session / frame reader handles
//! └─────────────────────┘
//! ```

pub mod capture_loop;
pub mod hardware_session;
pub mod profiles;
pub mod render_target;
pub mod types;

pub use capture_loop::{CaptureLoop, CaptureOutcome, DecodeMode};
pub use hardware_session::HardwareSession;
pub use profiles::{ProfileSource, ResolvedProfile, best_profile};
pub use render_target::{RenderTarget, RenderTargetProvider, TextureRegistry};
pub use types::*;

/// Entry point into a camera stack
///
/// Implementations are shared between sessions and must be internally
/// synchronized.
pub trait CameraPlatform: ProfileSource + Send + Sync {
    /// Cameras currently available
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDescription>>;

    /// Create a bounded frame reader producing frames of `size`
    fn create_frame_reader(
        &self,
        size: FrameSize,
        capacity: usize,
    ) -> BackendResult<Box<dyn FrameReader>>;

    /// Request access to a device
    ///
    /// Returns an error when the request is refused up front. Otherwise the
    /// outcome arrives later as `DeviceOpened` or `DeviceError`.
    fn open_device(&self, camera_id: &str, callbacks: PlatformCallbacks) -> BackendResult<()>;
}

/// An opened camera device
pub trait DeviceHandle: Send {
    /// Platform camera identifier
    fn id(&self) -> &str;

    /// Request a capture session over `surfaces`
    ///
    /// The outcome arrives as `SessionConfigured` or `SessionConfigureFailed`.
    fn create_capture_session(
        &mut self,
        surfaces: &[Surface],
        callbacks: PlatformCallbacks,
    ) -> BackendResult<()>;

    /// Release the device; the platform confirms with `DeviceClosed`
    fn close(&mut self);
}

/// A configured capture pipeline bound to a device
pub trait CaptureSessionHandle: Send {
    /// Start (or replace) the repeating request; each completed capture
    /// posts `CaptureCompleted`
    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
        callbacks: PlatformCallbacks,
    ) -> BackendResult<()>;

    /// Halt the repeating request without tearing the session down
    fn stop_repeating(&mut self) -> BackendResult<()>;

    fn close(&mut self);
}

/// Bounded pool of frames fed by a capture session
pub trait FrameReader: Send {
    /// Surface to target in capture requests
    fn surface(&self) -> Surface;

    /// Newest queued frame; older queued frames are dropped
    ///
    /// `None` when nothing is queued or every buffer is already held.
    fn acquire_latest(&mut self) -> Option<CameraFrame>;

    /// Stop producing availability notifications
    fn detach_listener(&mut self);

    fn close(&mut self);
}
