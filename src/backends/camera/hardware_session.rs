// SPDX-License-Identifier: GPL-3.0-only

//! Hardware session
//!
//! Owns the device handle, the capture session and the frame reader of one
//! scan session. Every method runs on the hardware-callback thread, so no
//! locking is involved; platform callbacks come back through the same queue.

use super::types::*;
use super::{CameraPlatform, CaptureSessionHandle, DeviceHandle, FrameReader};
use crate::errors::{SessionError, SessionResult};
use crate::session::SessionEvent;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Device, capture session and frame reader for one camera
pub struct HardwareSession {
    platform: Arc<dyn CameraPlatform>,
    callbacks: PlatformCallbacks,
    camera_id: String,
    preview_surface: Surface,
    device: Option<Box<dyn DeviceHandle>>,
    capture_session: Option<Box<dyn CaptureSessionHandle>>,
    frame_reader: Option<Box<dyn FrameReader>>,
    /// Request built by the last configure, reused on restart
    request: Option<CaptureRequest>,
    repeating: bool,
}

impl HardwareSession {
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        callbacks: PlatformCallbacks,
        camera_id: impl Into<String>,
        preview_surface: Surface,
        frame_reader: Box<dyn FrameReader>,
    ) -> Self {
        Self {
            platform,
            callbacks,
            camera_id: camera_id.into(),
            preview_surface,
            device: None,
            capture_session: None,
            frame_reader: Some(frame_reader),
            request: None,
            repeating: false,
        }
    }

    /// Whether a configured capture session exists
    pub fn has_capture_session(&self) -> bool {
        self.capture_session.is_some()
    }

    pub fn frame_reader_mut(&mut self) -> Option<&mut (dyn FrameReader + 'static)> {
        self.frame_reader.as_deref_mut()
    }

    /// Surface of the attached frame reader
    pub fn reader_surface(&self) -> Option<Surface> {
        self.frame_reader.as_ref().map(|reader| reader.surface())
    }

    /// Request device access; completion arrives as `DeviceOpened`
    pub fn open(&mut self) -> SessionResult<()> {
        if self.device.is_some() {
            return Err(SessionError::NotReady("The camera is already open.".into()));
        }
        info!(camera_id = %self.camera_id, "Opening camera device");
        self.platform
            .open_device(&self.camera_id, self.callbacks.clone())
            .map_err(SessionError::from)
    }

    /// Store the handle delivered by the device-opened callback
    pub fn on_device_opened(&mut self, device: Box<dyn DeviceHandle>) {
        debug!(camera_id = %device.id(), "Camera device opened");
        if let Some(mut stale) = self.device.replace(device) {
            warn!("Replacing an open device handle");
            stale.close();
        }
    }

    /// Build a capture session over the preview surface plus `targets`
    ///
    /// Any existing session is closed first. Repeating capture starts once
    /// the platform confirms the configuration.
    pub fn configure(&mut self, targets: &[Surface]) -> SessionResult<()> {
        self.close_capture_session();

        let device = self.device.as_mut().ok_or_else(SessionError::not_initialized)?;

        let mut request = CaptureRequest::new(CaptureTemplate::Preview);
        let mut surfaces = Vec::with_capacity(targets.len() + 1);
        surfaces.push(self.preview_surface);
        surfaces.extend_from_slice(targets);
        for surface in &surfaces {
            request.add_target(surface);
        }

        debug!(surfaces = surfaces.len(), "Configuring capture session");
        device.create_capture_session(&surfaces, self.callbacks.clone())?;
        self.request = Some(request);
        Ok(())
    }

    /// Adopt a configured session and start repeating capture
    pub fn on_session_configured(
        &mut self,
        mut session: Box<dyn CaptureSessionHandle>,
    ) -> SessionResult<()> {
        if self.device.is_none() {
            session.close();
            return Err(SessionError::Configuration(
                "The camera was closed during configuration.".into(),
            ));
        }
        if let Some(mut stale) = self.capture_session.replace(session) {
            stale.close();
        }
        if let Some(request) = self.request.as_mut() {
            request.control_mode = ControlMode::Auto;
        }
        self.start_repeating()
    }

    /// Start or resume the repeating request
    pub fn start_repeating(&mut self) -> SessionResult<()> {
        let session = self
            .capture_session
            .as_mut()
            .ok_or_else(SessionError::not_initialized)?;
        let request = self
            .request
            .as_ref()
            .ok_or_else(SessionError::not_initialized)?;
        session.set_repeating_request(request, self.callbacks.clone())?;
        self.repeating = true;
        debug!("Repeating capture started");
        Ok(())
    }

    /// Halt the repeating request; idempotent
    pub fn stop_repeating(&mut self) -> SessionResult<()> {
        let session = self
            .capture_session
            .as_mut()
            .ok_or_else(SessionError::not_initialized)?;
        if !self.repeating {
            return Ok(());
        }
        session.stop_repeating()?;
        self.repeating = false;
        debug!("Repeating capture stopped");
        Ok(())
    }

    /// Ordered teardown; idempotent
    pub fn close(&mut self) {
        if let Some(session) = self.capture_session.as_mut()
            && self.repeating
            && let Err(e) = session.stop_repeating()
        {
            debug!(error = %e, "Ignoring stop error during close");
        }
        self.repeating = false;

        self.close_capture_session();

        if let Some(mut reader) = self.frame_reader.take() {
            reader.detach_listener();
            reader.close();
        }

        if let Some(mut device) = self.device.take() {
            info!(camera_id = %self.camera_id, "Closing camera device");
            device.close();
        }
    }

    /// Device disconnected: tear down and report
    pub fn on_disconnected(&mut self) -> SessionEvent {
        warn!(camera_id = %self.camera_id, "Camera disconnected");
        self.close();
        SessionEvent::error("The camera was disconnected.")
    }

    /// Device error: tear down and report the mapped description
    pub fn on_device_error(&mut self, code: DeviceErrorCode) -> SessionEvent {
        warn!(camera_id = %self.camera_id, ?code, "Camera device error");
        self.close();
        SessionEvent::error(code.description())
    }

    fn close_capture_session(&mut self) {
        if let Some(mut session) = self.capture_session.take() {
            session.close();
            self.repeating = false;
        }
    }
}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for HardwareSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSession")
            .field("camera_id", &self.camera_id)
            .field("device", &self.device.is_some())
            .field("capture_session", &self.capture_session.is_some())
            .field("frame_reader", &self.frame_reader.is_some())
            .field("repeating", &self.repeating)
            .finish()
    }
}
