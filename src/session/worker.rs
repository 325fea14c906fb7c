// SPDX-License-Identifier: GPL-3.0-only

//! Hardware-callback context
//!
//! A single thread drains one ordered queue carrying caller commands,
//! platform callbacks and offloaded decode results. All session state lives
//! here, so no message ever observes a half-applied transition.

use super::events::{EventSink, ScanResult, SessionEvent};
use super::responder::Responder;
use super::state::SessionState;
use super::{OpenRequest, SessionDeps, SessionInfo, SessionSettings};
use crate::backends::camera::{
    CaptureLoop, CaptureOutcome, DecodeMode, DeviceErrorCode, HardwareSession, PlatformCallbacks,
    PlatformEvent, RenderTarget, ResolvedProfile, best_profile,
};
use crate::errors::{SessionError, SessionResult};
use crate::frame_processor::{SymbolFormat, resolve_formats};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Caller operations
pub(crate) enum Command {
    Open {
        request: OpenRequest,
        responder: Responder<SessionInfo>,
    },
    StartPreview(Responder<u64>),
    StopPreview(Responder<u64>),
    Dispose(Responder<()>),
}

pub(crate) enum Message {
    Command(Command),
    Platform(PlatformEvent),
    /// Result from the decode thread, tagged with its preview cycle
    Decoded { cycle: u64, text: String },
    /// Tear down and exit the worker thread
    Shutdown,
}

/// Hardware and decode side of an open session
struct ActiveSession {
    hardware: HardwareSession,
    capture: CaptureLoop,
    target: RenderTarget,
    profile: ResolvedProfile,
}

pub(crate) struct SessionWorker {
    deps: SessionDeps,
    settings: SessionSettings,
    queue: mpsc::UnboundedSender<Message>,
    state: watch::Sender<SessionState>,
    events: EventSink,
    results: mpsc::UnboundedSender<ScanResult>,
    session: Option<ActiveSession>,
    pending_open: Option<Responder<SessionInfo>>,
    /// Incremented every time repeating capture (re)starts
    preview_cycle: u64,
}

impl SessionWorker {
    pub fn new(
        deps: SessionDeps,
        settings: SessionSettings,
        queue: mpsc::UnboundedSender<Message>,
        state: watch::Sender<SessionState>,
        events: EventSink,
        results: mpsc::UnboundedSender<ScanResult>,
    ) -> Self {
        Self {
            deps,
            settings,
            queue,
            state,
            events,
            results,
            session: None,
            pending_open: None,
            preview_cycle: 0,
        }
    }

    /// Drain the queue until shutdown or until every sender is gone
    pub fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        debug!("Session worker started");
        while let Some(message) = inbox.blocking_recv() {
            match message {
                Message::Command(command) => self.handle_command(command),
                Message::Platform(event) => self.handle_platform_event(event),
                Message::Decoded { cycle, text } => self.handle_offloaded_result(cycle, text),
                Message::Shutdown => break,
            }
        }
        self.shutdown();
        debug!("Session worker exiting");
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Session state changed");
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open { request, responder } => self.open(request, responder),
            Command::StartPreview(responder) => {
                let result = self.start_preview();
                responder.send(result);
            }
            Command::StopPreview(responder) => self.stop_preview(responder),
            Command::Dispose(responder) => {
                self.dispose();
                responder.send(Ok(()));
            }
        }
    }

    fn open(&mut self, request: OpenRequest, responder: Responder<SessionInfo>) {
        let state = self.current_state();
        if state != SessionState::Idle {
            responder.send(Err(SessionError::NotReady(format!(
                "The camera session cannot be opened while {}.",
                state
            ))));
            return;
        }

        info!(
            camera_id = %request.camera_id,
            preset = %request.preset,
            "Opening scan session"
        );
        self.set_state(SessionState::Opening);
        match self.begin_open(&request) {
            Ok(()) => self.pending_open = Some(responder),
            Err(e) => {
                self.fail_open(e.clone());
                responder.send(Err(e));
            }
        }
    }

    fn begin_open(&mut self, request: &OpenRequest) -> SessionResult<()> {
        let formats = resolve_formats(&request.formats)?;
        let profile = best_profile(self.deps.platform.as_ref(), &request.camera_id, request.preset)?;
        let target = self
            .deps
            .render_targets
            .create()
            .with_buffer_size(profile.preview);

        let session = match self.build_session(&request.camera_id, &formats, profile, target) {
            Ok(session) => session,
            Err(e) => {
                self.deps.render_targets.release(target.texture_id);
                return Err(e);
            }
        };
        debug!(
            texture_id = target.texture_id,
            capture = %profile.capture,
            preview = %profile.preview,
            "Session resources allocated"
        );
        self.session.insert(session).hardware.open()
    }

    fn build_session(
        &self,
        camera_id: &str,
        formats: &[SymbolFormat],
        profile: ResolvedProfile,
        target: RenderTarget,
    ) -> SessionResult<ActiveSession> {
        let decoder = self
            .deps
            .decoders
            .create(formats, self.settings.max_decode_dimension);
        let capture = match self.settings.decode_mode {
            DecodeMode::Inline => CaptureLoop::inline(decoder),
            DecodeMode::Offloaded => {
                let queue = self.queue.clone();
                CaptureLoop::offloaded(decoder, move |cycle, text| {
                    let _ = queue.send(Message::Decoded { cycle, text });
                })?
            }
        };

        let reader = self
            .deps
            .platform
            .create_frame_reader(profile.capture, self.settings.frame_reader_capacity)?;

        let queue = self.queue.clone();
        let callbacks = PlatformCallbacks::new(move |event| {
            if queue.send(Message::Platform(event)).is_err() {
                trace!("Platform callback after session worker exited");
            }
        });

        let hardware = HardwareSession::new(
            self.deps.platform.clone(),
            callbacks,
            camera_id,
            target.surface,
            reader,
        );

        Ok(ActiveSession {
            hardware,
            capture,
            target,
            profile,
        })
    }

    fn start_preview(&mut self) -> SessionResult<u64> {
        if self.current_state() != SessionState::Stopped {
            return Err(SessionError::NotReady(
                "The camera preview is not stopped.".to_string(),
            ));
        }
        let session = self
            .session
            .as_mut()
            .filter(|session| session.hardware.has_capture_session())
            .ok_or_else(SessionError::not_initialized)?;
        session.hardware.start_repeating()?;
        let texture_id = session.target.texture_id;
        self.preview_cycle += 1;
        self.set_state(SessionState::Previewing);
        Ok(texture_id)
    }

    fn stop_preview(&mut self, responder: Responder<u64>) {
        if self.current_state() != SessionState::Previewing {
            responder.send(Err(SessionError::NotReady(
                "The camera preview is not running.".to_string(),
            )));
            return;
        }
        let Some(session) = self.session.as_mut() else {
            responder.send(Err(SessionError::not_initialized()));
            return;
        };
        match session.hardware.stop_repeating() {
            Ok(()) => {
                let texture_id = session.target.texture_id;
                self.set_state(SessionState::Stopped);
                responder.send(Ok(texture_id));
            }
            Err(e) => responder.send(Err(e)),
        }
    }

    /// Full teardown on request; idempotent
    ///
    /// A failed session has nothing left to release and stays `Failed`.
    fn dispose(&mut self) {
        let state = self.current_state();
        if self.session.is_none() && state.is_terminal() {
            debug!(%state, "Dispose on released session");
            return;
        }
        self.set_state(SessionState::Closing);
        self.teardown();
        self.set_state(SessionState::Closed);
        self.reject_pending_open(SessionError::NotReady(
            "The camera was disposed before it finished opening.".to_string(),
        ));
    }

    fn handle_platform_event(&mut self, event: PlatformEvent) {
        trace!(?event, "Platform event");
        match event {
            PlatformEvent::DeviceOpened(mut device) => {
                let opening = self.current_state() == SessionState::Opening;
                let Some(session) = self.session.as_mut().filter(|_| opening) else {
                    debug!("Device opened for a session that is gone, closing it");
                    device.close();
                    return;
                };
                session.hardware.on_device_opened(device);
                let targets: Vec<_> = session.hardware.reader_surface().into_iter().collect();
                let configured = session.hardware.configure(&targets);
                self.set_state(SessionState::Configuring);
                if let Err(e) = configured {
                    self.fail_open_and_reply(e);
                }
            }
            PlatformEvent::SessionConfigured(mut capture_session) => {
                if self.current_state() != SessionState::Configuring {
                    debug!("Capture session configured for a session that is gone");
                    capture_session.close();
                    return;
                }
                let Some(session) = self.session.as_mut() else {
                    capture_session.close();
                    return;
                };
                match session.hardware.on_session_configured(capture_session) {
                    Ok(()) => self.on_previewing(),
                    Err(e) => self.fail_open_and_reply(e),
                }
            }
            PlatformEvent::SessionConfigureFailed => {
                if self.current_state() == SessionState::Configuring {
                    self.fail_open_and_reply(SessionError::Configuration(
                        "Failed to configure camera session.".to_string(),
                    ));
                }
            }
            PlatformEvent::DeviceClosed => {
                debug!("Device closed");
                self.events.emit(SessionEvent::Closing);
            }
            PlatformEvent::DeviceDisconnected => {
                let Some(session) = self.session.as_mut() else {
                    debug!("Disconnect for a session that is gone");
                    return;
                };
                let event = session.hardware.on_disconnected();
                self.on_fatal_device_event(
                    event,
                    SessionError::Device("The camera was disconnected.".to_string()),
                );
            }
            PlatformEvent::DeviceError(code) => {
                let Some(session) = self.session.as_mut() else {
                    debug!(?code, "Device error for a session that is gone");
                    return;
                };
                let event = session.hardware.on_device_error(code);
                self.on_fatal_device_event(event, device_error_to_session_error(code));
            }
            PlatformEvent::CaptureCompleted => self.on_capture_completed(),
        }
    }

    fn on_previewing(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let info = SessionInfo {
            texture_id: session.target.texture_id,
            preview_width: session.profile.preview.width,
            preview_height: session.profile.preview.height,
        };
        self.preview_cycle += 1;
        self.set_state(SessionState::Previewing);
        info!(texture_id = info.texture_id, "Camera preview started");
        if let Some(responder) = self.pending_open.take() {
            responder.send(Ok(info));
        }
    }

    fn on_capture_completed(&mut self) {
        let previewing = self.current_state() == SessionState::Previewing;
        let cycle = self.preview_cycle;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let reader = session.hardware.frame_reader_mut();
        match session.capture.on_capture_completed(previewing, cycle, reader) {
            CaptureOutcome::Decoded(text) => self.deliver(text),
            CaptureOutcome::NoMatch => trace!("No symbol in frame"),
            CaptureOutcome::NoFrame | CaptureOutcome::Ignored | CaptureOutcome::Submitted => {}
        }
    }

    fn handle_offloaded_result(&mut self, cycle: u64, text: String) {
        if self.current_state() != SessionState::Previewing || cycle != self.preview_cycle {
            debug!(cycle, current = self.preview_cycle, "Discarding stale decode result");
            return;
        }
        self.deliver(text);
    }

    /// Stop the preview, then hand the result to the caller
    fn deliver(&mut self, text: String) {
        info!(len = text.len(), "Symbol decoded, stopping preview");
        self.stop_preview(Responder::discard());
        if self.results.send(ScanResult { text }).is_err() {
            debug!("No result receiver, dropping scan result");
        }
    }

    /// Device went away or failed while open: release and report
    fn on_fatal_device_event(&mut self, event: SessionEvent, open_error: SessionError) {
        let was_opening = self.current_state().is_opening();
        self.set_state(SessionState::Closing);
        self.teardown();
        // State is terminal before the open is rejected
        if was_opening {
            self.set_state(SessionState::Failed);
            self.reject_pending_open(open_error);
        } else {
            self.set_state(SessionState::Closed);
        }
        self.events.emit(event);
    }

    fn fail_open_and_reply(&mut self, error: SessionError) {
        warn!(error = %error, "Failed to open camera session");
        self.fail_open(error.clone());
        self.reject_pending_open(error);
    }

    fn fail_open(&mut self, error: SessionError) {
        debug!(code = error.code(), "Tearing down after open failure");
        self.teardown();
        self.set_state(SessionState::Failed);
    }

    fn reject_pending_open(&mut self, error: SessionError) {
        if let Some(responder) = self.pending_open.take() {
            responder.send(Err(error));
        }
    }

    /// Ordered hardware teardown and render target release
    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.hardware.close();
            self.deps.render_targets.release(session.target.texture_id);
            // Dropping the capture loop joins any decode thread
            drop(session);
        }
    }

    fn shutdown(&mut self) {
        let state = self.current_state();
        if self.session.is_some() || (!state.is_terminal() && state != SessionState::Idle) {
            self.set_state(SessionState::Closing);
            self.teardown();
            self.set_state(SessionState::Closed);
        }
        self.reject_pending_open(SessionError::not_initialized());
    }
}

/// Open failure reported for an asynchronous device error
fn device_error_to_session_error(code: DeviceErrorCode) -> SessionError {
    let description = code.description().to_string();
    match code {
        DeviceErrorCode::InUse | DeviceErrorCode::MaxInUse | DeviceErrorCode::PolicyDisabled => {
            SessionError::Access(description)
        }
        DeviceErrorCode::FatalDevice => SessionError::Device(description),
        DeviceErrorCode::FatalService | DeviceErrorCode::Unknown(_) => {
            SessionError::Service(description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_during_open() {
        assert_eq!(
            device_error_to_session_error(DeviceErrorCode::InUse).code(),
            "CameraAccess"
        );
        assert_eq!(
            device_error_to_session_error(DeviceErrorCode::FatalDevice).code(),
            "CameraDevice"
        );
        assert_eq!(
            device_error_to_session_error(DeviceErrorCode::Unknown(9)).description(),
            "Unknown camera error"
        );
    }
}
