// SPDX-License-Identifier: GPL-3.0-only

//! Camera and microphone permission gate

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Error code of every permission failure
pub const PERMISSION_ERROR_CODE: &str = "cameraPermission";

/// A refused or rejected permission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionError {
    pub code: String,
    pub description: String,
}

impl PermissionError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            code: PERMISSION_ERROR_CODE.to_string(),
            description: description.into(),
        }
    }

    /// Another request is still waiting for the user
    pub fn busy() -> Self {
        Self::new("Camera permission request ongoing")
    }
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl std::error::Error for PermissionError {}

pub type PermissionResult = Result<(), PermissionError>;

/// Platform permission prompt
pub trait PermissionGate: Send + Sync {
    /// Ensure camera access, plus microphone access when `needs_audio`
    fn request_access(&self, needs_audio: bool) -> BoxFuture<'static, PermissionResult>;
}

/// Gate for environments without a permission model
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn request_access(&self, _needs_audio: bool) -> BoxFuture<'static, PermissionResult> {
        futures::future::ready(Ok(())).boxed()
    }
}

/// Fixed grants, answered immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPermissions {
    pub camera: bool,
    pub audio: bool,
}

impl PermissionGate for StaticPermissions {
    fn request_access(&self, needs_audio: bool) -> BoxFuture<'static, PermissionResult> {
        let result = if !self.camera {
            Err(PermissionError::new("Camera permission not granted"))
        } else if needs_audio && !self.audio {
            Err(PermissionError::new("Audio permission not granted"))
        } else {
            Ok(())
        };
        futures::future::ready(result).boxed()
    }
}

/// Allows one permission request in flight at a time
#[derive(Clone)]
pub struct PermissionCoordinator {
    gate: Arc<dyn PermissionGate>,
    ongoing: Arc<AtomicBool>,
}

/// Clears the in-flight flag, also when the request future is dropped
struct OngoingGuard(Arc<AtomicBool>);

impl Drop for OngoingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PermissionCoordinator {
    pub fn new(gate: Arc<dyn PermissionGate>) -> Self {
        Self {
            gate,
            ongoing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.ongoing.load(Ordering::SeqCst)
    }

    /// Run the gate; fails at once with a busy error while another request
    /// is pending
    pub async fn request(&self, needs_audio: bool) -> PermissionResult {
        if self.ongoing.swap(true, Ordering::SeqCst) {
            debug!("Permission request already in flight");
            return Err(PermissionError::busy());
        }
        let _guard = OngoingGuard(Arc::clone(&self.ongoing));
        self.gate.request_access(needs_audio).await
    }
}

impl std::fmt::Debug for PermissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCoordinator")
            .field("ongoing", &self.is_ongoing())
            .finish()
    }
}
