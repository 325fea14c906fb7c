// SPDX-License-Identifier: GPL-3.0-only

//! Device and capture session handles of the virtual camera

use super::frame_pump::{FramePump, LoopAction};
use super::{ConfigureBehavior, Shared};
use crate::backends::camera::{
    BackendError, BackendResult, CaptureRequest, CaptureSessionHandle, DeviceHandle,
    PlatformCallbacks, Surface,
};
use std::sync::Arc;
use tracing::{debug, info};

/// An opened virtual camera
pub struct VirtualDevice {
    camera_id: String,
    shared: Arc<Shared>,
    callbacks: PlatformCallbacks,
    closed: bool,
}

impl VirtualDevice {
    pub(crate) fn new(camera_id: &str, shared: Arc<Shared>, callbacks: PlatformCallbacks) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            shared,
            callbacks,
            closed: false,
        }
    }
}

impl DeviceHandle for VirtualDevice {
    fn id(&self) -> &str {
        &self.camera_id
    }

    fn create_capture_session(
        &mut self,
        surfaces: &[Surface],
        callbacks: PlatformCallbacks,
    ) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        if !self.shared.is_open(&self.camera_id) {
            return Err(BackendError::Disconnected);
        }
        self.shared.validate_surfaces(surfaces)?;

        match self.shared.configure_behavior(&self.camera_id) {
            ConfigureBehavior::Fail => {
                debug!(camera_id = %self.camera_id, "Refusing capture session");
                callbacks.session_configure_failed();
            }
            ConfigureBehavior::Succeed => {
                debug!(camera_id = %self.camera_id, surfaces = surfaces.len(), "Capture session configured");
                callbacks.session_configured(Box::new(VirtualCaptureSession::new(
                    &self.camera_id,
                    Arc::clone(&self.shared),
                )));
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.shared.release_device(&self.camera_id) {
            info!(camera_id = %self.camera_id, "Virtual camera closed");
        }
        self.callbacks.device_closed();
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// A configured virtual capture session
pub struct VirtualCaptureSession {
    camera_id: String,
    session_id: u64,
    shared: Arc<Shared>,
    pump: Option<FramePump>,
    closed: bool,
}

impl VirtualCaptureSession {
    fn new(camera_id: &str, shared: Arc<Shared>) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            session_id: shared.next_session_id(),
            shared,
            pump: None,
            closed: false,
        }
    }

    fn stop_pump(&mut self) {
        // Joining must happen without the shared lock held
        if let Some(mut pump) = self.pump.take() {
            pump.stop();
        }
    }
}

impl CaptureSessionHandle for VirtualCaptureSession {
    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
        callbacks: PlatformCallbacks,
    ) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        if !self.shared.is_open(&self.camera_id) {
            return Err(BackendError::Disconnected);
        }
        self.stop_pump();
        self.shared.set_repeating(
            &self.camera_id,
            self.session_id,
            request.targets.clone(),
            callbacks,
        );

        if let Some(interval) = self.shared.frame_interval() {
            let shared = Arc::clone(&self.shared);
            let camera_id = self.camera_id.clone();
            let pump = FramePump::start(
                &format!("virtual-capture-{}", self.camera_id),
                interval,
                move || {
                    if shared.capture(&camera_id) {
                        LoopAction::Continue
                    } else {
                        LoopAction::Stop
                    }
                },
            )
            .map_err(|e| BackendError::Other(format!("Failed to start frame pump: {}", e)))?;
            self.pump = Some(pump);
        }
        Ok(())
    }

    fn stop_repeating(&mut self) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        self.shared.clear_repeating(&self.camera_id, self.session_id);
        self.stop_pump();
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.clear_repeating(&self.camera_id, self.session_id);
        self.stop_pump();
    }
}

impl Drop for VirtualCaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
