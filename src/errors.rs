// SPDX-License-Identifier: MPL-2.0

//! Error types for scan sessions

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors reported to callers of session operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Permission denied, device in use or disabled by policy
    Access(String),
    /// Session setup raced with a close, or the surface set was rejected
    Configuration(String),
    /// Persistent hardware fault
    Device(String),
    /// Platform camera service fault
    Service(String),
    /// Operation is invalid in the current session state
    NotReady(String),
    /// The device offers no usable capture profile
    NoProfileAvailable(String),
    /// A symbol format name that is not in the format table
    UnknownFormat(String),
}

impl SessionError {
    /// Stable error code handed to the host layer
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Access(_) => "CameraAccess",
            SessionError::Configuration(_) => "CameraConfiguration",
            SessionError::Device(_) => "CameraDevice",
            SessionError::Service(_) => "CameraService",
            SessionError::NotReady(_) => "NotReady",
            SessionError::NoProfileAvailable(_) => "NoProfileAvailable",
            SessionError::UnknownFormat(_) => "UnknownFormat",
        }
    }

    /// Human readable description without the category prefix
    pub fn description(&self) -> &str {
        match self {
            SessionError::Access(msg)
            | SessionError::Configuration(msg)
            | SessionError::Device(msg)
            | SessionError::Service(msg)
            | SessionError::NotReady(msg)
            | SessionError::NoProfileAvailable(msg)
            | SessionError::UnknownFormat(msg) => msg,
        }
    }

    pub(crate) fn not_initialized() -> Self {
        SessionError::NotReady("The camera has been closed, please initialize first.".to_string())
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Access(msg) => write!(f, "Camera access error: {}", msg),
            SessionError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            SessionError::Device(msg) => write!(f, "Device error: {}", msg),
            SessionError::Service(msg) => write!(f, "Service error: {}", msg),
            SessionError::NotReady(msg) => write!(f, "Not ready: {}", msg),
            SessionError::NoProfileAvailable(msg) => write!(f, "No profile available: {}", msg),
            SessionError::UnknownFormat(name) => write!(f, "Unknown symbol format: {}", name),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::AccessDenied(msg) => SessionError::Access(msg),
            BackendError::InUse => SessionError::Access("The camera device is in use already.".into()),
            BackendError::MaxInUse => SessionError::Access("Max cameras in use".into()),
            BackendError::Disabled => SessionError::Access(
                "The camera device could not be opened due to a device policy.".into(),
            ),
            BackendError::DeviceNotFound(id) => {
                SessionError::Access(format!("Camera device not found: {}", id))
            }
            BackendError::Disconnected => {
                SessionError::Device("The camera was disconnected.".into())
            }
            BackendError::Device(msg) => SessionError::Device(msg),
            BackendError::Service(msg) => SessionError::Service(msg),
            BackendError::InvalidSurfaces(msg) => SessionError::Configuration(msg),
            BackendError::Closed => SessionError::Configuration(
                "The camera was closed during configuration.".into(),
            ),
            BackendError::Other(msg) => SessionError::Service(msg),
        }
    }
}
