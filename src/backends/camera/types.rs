// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use super::{CaptureSessionHandle, DeviceHandle};
use crate::frame_processor::LumaFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Frame or surface dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which way the lens points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    Back,
    External,
}

/// A camera advertised by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDescription {
    /// Platform camera identifier, passed back to `open`
    pub name: String,
    /// Clockwise sensor rotation in degrees
    pub sensor_orientation: u32,
    /// `None` when the platform does not report it
    pub lens_facing: Option<LensFacing>,
}

/// Pixel layout of frames produced by a frame reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar 4:2:0; plane 0 is full resolution luminance
    Yuv420,
    /// Single 8-bit luminance plane
    Gray8,
}

/// One plane of a captured frame
#[derive(Debug, Clone)]
pub struct FramePlane {
    pub data: Arc<[u8]>,
    /// Bytes per row, may include padding
    pub row_stride: usize,
}

/// Returns a pooled buffer to its frame reader when dropped
pub struct FrameLease(Option<Box<dyn FnOnce() + Send>>);

impl FrameLease {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl std::fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FrameLease")
    }
}

/// A frame acquired from a frame reader
///
/// Holds one buffer of the reader's pool until dropped.
#[derive(Debug)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<FramePlane>,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
    lease: Option<FrameLease>,
}

impl CameraFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, planes: Vec<FramePlane>) -> Self {
        Self {
            width,
            height,
            format,
            planes,
            captured_at: Instant::now(),
            lease: None,
        }
    }

    /// Attach the pool lease released when this frame is dropped
    pub fn with_lease(mut self, lease: FrameLease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Luminance plane view, `None` when the plane is missing or truncated
    pub fn luma(&self) -> Option<LumaFrame<'_>> {
        let plane = self.planes.first()?;
        LumaFrame::new(&plane.data, self.width, self.height, plane.row_stride)
    }
}

/// Opaque identifier of a render or reader surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// What a surface is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Display surface backing the preview texture
    Preview,
    /// Input side of a frame reader
    FrameReader,
}

/// A capture target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
    pub size: FrameSize,
}

/// Capture request template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTemplate {
    Preview,
}

/// 3A control mode on a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Leave the platform default
    #[default]
    Default,
    /// Auto exposure, focus and white balance
    Auto,
}

/// Repeating capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: CaptureTemplate,
    pub targets: Vec<SurfaceId>,
    pub control_mode: ControlMode,
}

impl CaptureRequest {
    pub fn new(template: CaptureTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            control_mode: ControlMode::Default,
        }
    }

    pub fn add_target(&mut self, surface: &Surface) {
        if !self.targets.contains(&surface.id) {
            self.targets.push(surface.id);
        }
    }
}

/// Error codes delivered by the device error callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    InUse,
    MaxInUse,
    PolicyDisabled,
    FatalDevice,
    FatalService,
    Unknown(i32),
}

impl DeviceErrorCode {
    /// Map a raw platform error code
    pub fn from_raw(code: i32) -> Self {
        match code {
            1 => DeviceErrorCode::InUse,
            2 => DeviceErrorCode::MaxInUse,
            3 => DeviceErrorCode::PolicyDisabled,
            4 => DeviceErrorCode::FatalDevice,
            5 => DeviceErrorCode::FatalService,
            other => DeviceErrorCode::Unknown(other),
        }
    }

    /// Description emitted on the event stream
    pub fn description(&self) -> &'static str {
        match self {
            DeviceErrorCode::InUse => "The camera device is in use already.",
            DeviceErrorCode::MaxInUse => "Max cameras in use",
            DeviceErrorCode::PolicyDisabled => {
                "The camera device could not be opened due to a device policy."
            }
            DeviceErrorCode::FatalDevice => "The camera device has encountered a fatal error",
            DeviceErrorCode::FatalService => "The camera service has encountered a fatal error.",
            DeviceErrorCode::Unknown(_) => "Unknown camera error",
        }
    }
}

/// Asynchronous notifications from the camera platform
pub enum PlatformEvent {
    DeviceOpened(Box<dyn DeviceHandle>),
    /// The platform confirmed the device is closed
    DeviceClosed,
    DeviceDisconnected,
    DeviceError(DeviceErrorCode),
    SessionConfigured(Box<dyn CaptureSessionHandle>),
    SessionConfigureFailed,
    CaptureCompleted,
}

impl std::fmt::Debug for PlatformEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformEvent::DeviceOpened(device) => write!(f, "DeviceOpened({})", device.id()),
            PlatformEvent::DeviceClosed => f.write_str("DeviceClosed"),
            PlatformEvent::DeviceDisconnected => f.write_str("DeviceDisconnected"),
            PlatformEvent::DeviceError(code) => write!(f, "DeviceError({:?})", code),
            PlatformEvent::SessionConfigured(_) => f.write_str("SessionConfigured"),
            PlatformEvent::SessionConfigureFailed => f.write_str("SessionConfigureFailed"),
            PlatformEvent::CaptureCompleted => f.write_str("CaptureCompleted"),
        }
    }
}

/// Handle the platform uses to post callbacks into the hardware-callback context
///
/// Posting never blocks. Callbacks posted after the session is gone are dropped.
#[derive(Clone)]
pub struct PlatformCallbacks {
    post: Arc<dyn Fn(PlatformEvent) + Send + Sync>,
}

impl PlatformCallbacks {
    pub fn new(post: impl Fn(PlatformEvent) + Send + Sync + 'static) -> Self {
        Self {
            post: Arc::new(post),
        }
    }

    pub fn post(&self, event: PlatformEvent) {
        (self.post)(event);
    }

    pub fn device_opened(&self, device: Box<dyn DeviceHandle>) {
        self.post(PlatformEvent::DeviceOpened(device));
    }

    pub fn device_closed(&self) {
        self.post(PlatformEvent::DeviceClosed);
    }

    pub fn device_disconnected(&self) {
        self.post(PlatformEvent::DeviceDisconnected);
    }

    pub fn device_error(&self, code: DeviceErrorCode) {
        self.post(PlatformEvent::DeviceError(code));
    }

    pub fn session_configured(&self, session: Box<dyn CaptureSessionHandle>) {
        self.post(PlatformEvent::SessionConfigured(session));
    }

    pub fn session_configure_failed(&self) {
        self.post(PlatformEvent::SessionConfigureFailed);
    }

    pub fn capture_completed(&self) {
        self.post(PlatformEvent::CaptureCompleted);
    }
}

impl std::fmt::Debug for PlatformCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlatformCallbacks")
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Permission to use the camera was refused
    AccessDenied(String),
    /// The device is held by another client
    InUse,
    /// The platform limit of open cameras was reached
    MaxInUse,
    /// Disabled by device policy
    Disabled,
    /// No camera with this identifier
    DeviceNotFound(String),
    /// The device went away
    Disconnected,
    /// Persistent hardware fault
    Device(String),
    /// Camera service fault
    Service(String),
    /// Surface set rejected by the platform
    InvalidSurfaces(String),
    /// Operation on a handle that was already closed
    Closed,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::AccessDenied(msg) => write!(f, "Access denied: {}", msg),
            BackendError::InUse => write!(f, "Camera in use"),
            BackendError::MaxInUse => write!(f, "Max cameras in use"),
            BackendError::Disabled => write!(f, "Camera disabled by policy"),
            BackendError::DeviceNotFound(id) => write!(f, "Device not found: {}", id),
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::Device(msg) => write!(f, "Device error: {}", msg),
            BackendError::Service(msg) => write!(f, "Service error: {}", msg),
            BackendError::InvalidSurfaces(msg) => write!(f, "Invalid surfaces: {}", msg),
            BackendError::Closed => write!(f, "Handle already closed"),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
