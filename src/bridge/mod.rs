// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing method surface
//!
//! The relaying layer (a UI toolkit binding, an IPC endpoint or the CLI)
//! forwards method calls here as JSON-shaped requests and gets JSON-shaped
//! replies. One scan session is active at a time; `initialize` replaces it.
//! Scan results come back as [`HostNotification`]s and device events on a
//! per-texture event stream.

pub mod permissions;

pub use permissions::{
    AlwaysGranted, PERMISSION_ERROR_CODE, PermissionCoordinator, PermissionError, PermissionGate,
    StaticPermissions,
};

use crate::constants::ResolutionPreset;
use crate::errors::SessionError;
use crate::session::{
    OpenRequest, SessionController, SessionDeps, SessionEvent, SessionSettings, SessionState,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Arguments of `initialize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArgs {
    pub camera_name: String,
    #[serde(default)]
    pub resolution_preset: ResolutionPreset,
    #[serde(default)]
    pub enable_audio: bool,
    /// Symbol format names; empty means QR only
    #[serde(default)]
    pub code_formats: Vec<String>,
}

/// A method call from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum MethodCall {
    #[serde(rename = "getPlatformVersion")]
    PlatformVersion,
    AvailableCameras,
    Initialize(InitializeArgs),
    StartPreview,
    StopPreview,
    Dispose,
}

impl MethodCall {
    pub fn name(&self) -> &'static str {
        match self {
            MethodCall::PlatformVersion => "getPlatformVersion",
            MethodCall::AvailableCameras => "availableCameras",
            MethodCall::Initialize(_) => "initialize",
            MethodCall::StartPreview => "startPreview",
            MethodCall::StopPreview => "stopPreview",
            MethodCall::Dispose => "dispose",
        }
    }
}

/// Calls from the scanner back into the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum HostNotification {
    /// Decoded text of a successful scan
    ScanSuccess(String),
}

/// Error reply to a method call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostError {
    pub code: String,
    pub message: String,
}

impl HostError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_implemented(detail: impl std::fmt::Display) -> Self {
        Self::new("notImplemented", format!("Method not implemented: {}", detail))
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for HostError {}

impl From<SessionError> for HostError {
    fn from(err: SessionError) -> Self {
        Self::new(err.code(), err.description())
    }
}

impl From<PermissionError> for HostError {
    fn from(err: PermissionError) -> Self {
        Self::new(err.code, err.description)
    }
}

pub type HostResult = Result<Value, HostError>;

struct ActiveScan {
    controller: SessionController,
    texture_id: Option<u64>,
}

/// Dispatches host method calls onto scan sessions
pub struct ScannerHost {
    deps: SessionDeps,
    settings: SessionSettings,
    permissions: PermissionCoordinator,
    active: tokio::sync::Mutex<Option<ActiveScan>>,
    notifications: mpsc::UnboundedSender<HostNotification>,
    notifications_rx: Mutex<Option<mpsc::UnboundedReceiver<HostNotification>>>,
}

impl ScannerHost {
    pub fn new(deps: SessionDeps, settings: SessionSettings, gate: Arc<dyn PermissionGate>) -> Self {
        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        Self {
            deps,
            settings,
            permissions: PermissionCoordinator::new(gate),
            active: tokio::sync::Mutex::new(None),
            notifications,
            notifications_rx: Mutex::new(Some(notifications_rx)),
        }
    }

    /// Notification receiver; handed out once
    pub fn take_notifications(&self) -> Option<mpsc::UnboundedReceiver<HostNotification>> {
        self.notifications_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Decode a raw `{ "method", "args" }` request and dispatch it
    pub async fn handle_json(&self, request: Value) -> HostResult {
        let call: MethodCall = serde_json::from_value(request).map_err(HostError::not_implemented)?;
        self.handle(call).await
    }

    pub async fn handle(&self, call: MethodCall) -> HostResult {
        debug!(method = call.name(), "Method call");
        let result = match call {
            MethodCall::PlatformVersion => Ok(json!(platform_version())),
            MethodCall::AvailableCameras => self.available_cameras(),
            MethodCall::Initialize(args) => self.initialize(args).await,
            MethodCall::StartPreview => self.start_preview().await,
            MethodCall::StopPreview => self.stop_preview().await,
            MethodCall::Dispose => self.dispose().await,
        };
        if let Err(e) = &result {
            warn!(code = %e.code, message = %e.message, "Method call failed");
        }
        result
    }

    /// Event stream of the session rendering into `texture_id`
    ///
    /// Replaces any earlier stream of that session. `None` when no active
    /// session owns the texture.
    pub async fn event_stream(&self, texture_id: u64) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        let active = self.active.lock().await;
        active
            .as_ref()
            .filter(|scan| scan.texture_id == Some(texture_id))
            .map(|scan| scan.controller.subscribe_events())
    }

    /// State of the active session
    pub async fn session_state(&self) -> Option<SessionState> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|scan| scan.controller.state())
    }

    fn available_cameras(&self) -> HostResult {
        let cameras = self
            .deps
            .platform
            .enumerate_cameras()
            .map_err(SessionError::from)?;
        serde_json::to_value(cameras).map_err(|e| HostError::new("CameraAccess", e.to_string()))
    }

    async fn initialize(&self, args: InitializeArgs) -> HostResult {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            info!("Closing previous scan session");
            Self::close_scan(previous).await;
        }

        self.permissions.request(args.enable_audio).await?;

        let controller = SessionController::new(self.deps.clone(), self.settings)?;
        if let Some(mut results) = controller.take_results() {
            let notifications = self.notifications.clone();
            tokio::spawn(async move {
                while let Some(result) = results.recv().await {
                    if notifications
                        .send(HostNotification::ScanSuccess(result.text))
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }

        let request = OpenRequest::new(args.camera_name)
            .with_preset(args.resolution_preset)
            .with_formats(args.code_formats);
        let opened = controller.open(request).await;
        let mut active = self.active.lock().await;
        if let Some(replaced) = active.take() {
            Self::close_scan(replaced).await;
        }
        match opened {
            Ok(info) => {
                *active = Some(ActiveScan {
                    controller,
                    texture_id: Some(info.texture_id),
                });
                serde_json::to_value(info).map_err(|e| HostError::new("CameraAccess", e.to_string()))
            }
            Err(e) => {
                // Keep the failed session so its state stays observable
                *active = Some(ActiveScan {
                    controller,
                    texture_id: None,
                });
                Err(e.into())
            }
        }
    }

    async fn start_preview(&self) -> HostResult {
        let active = self.active.lock().await;
        let scan = active.as_ref().ok_or_else(SessionError::not_initialized)?;
        let texture_id = scan.controller.start_preview().await?;
        Ok(json!({ "textureId": texture_id }))
    }

    async fn stop_preview(&self) -> HostResult {
        let active = self.active.lock().await;
        let scan = active.as_ref().ok_or_else(SessionError::not_initialized)?;
        let texture_id = scan.controller.stop_preview().await?;
        Ok(json!({ "textureId": texture_id }))
    }

    async fn dispose(&self) -> HostResult {
        let active = self.active.lock().await;
        if let Some(scan) = active.as_ref() {
            scan.controller.dispose().await?;
        }
        Ok(Value::Null)
    }

    async fn close_scan(scan: ActiveScan) {
        if let Err(e) = scan.controller.dispose().await {
            debug!(error = %e, "Dispose of previous session failed");
        }
    }
}

/// Version string reported to the host
pub fn platform_version() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("GIT_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_calls_decode_from_wire() {
        let call: MethodCall = serde_json::from_value(json!({
            "method": "initialize",
            "args": { "cameraName": "0", "resolutionPreset": "low", "codeFormats": ["qr"] }
        }))
        .unwrap();
        assert_eq!(
            call,
            MethodCall::Initialize(InitializeArgs {
                camera_name: "0".into(),
                resolution_preset: ResolutionPreset::Low,
                enable_audio: false,
                code_formats: vec!["qr".into()],
            })
        );

        let call: MethodCall = serde_json::from_value(json!({ "method": "dispose" })).unwrap();
        assert_eq!(call, MethodCall::Dispose);
        assert_eq!(call.name(), "dispose");

        let call: MethodCall =
            serde_json::from_value(json!({ "method": "getPlatformVersion" })).unwrap();
        assert_eq!(call, MethodCall::PlatformVersion);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(serde_json::from_value::<MethodCall>(json!({ "method": "takePicture" })).is_err());
    }

    #[test]
    fn scan_success_wire_format() {
        let value = serde_json::to_value(HostNotification::ScanSuccess("HELLO".into())).unwrap();
        assert_eq!(value, json!({ "method": "scanSuccess", "args": "HELLO" }));
    }

    #[test]
    fn session_errors_keep_their_code() {
        let err = HostError::from(SessionError::not_initialized());
        assert_eq!(err.code, "NotReady");
        assert_eq!(err.message, "The camera has been closed, please initialize first.");

        let err = HostError::from(PermissionError::busy());
        assert_eq!(err.code, "cameraPermission");
    }
}
