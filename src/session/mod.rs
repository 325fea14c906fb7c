// SPDX-License-Identifier: GPL-3.0-only

//! Scan session controller
//!
//! Drives one camera through open, configure, preview, auto-stop and
//! teardown. Every operation is posted to the session worker and returns a
//! [`Pending`] future for its outcome; decoded results and device events are
//! delivered on channels the caller drains on its own task.
//!
//! ```text
//! Idle ─open→ Opening ─device ready→ Configuring ─configured→ Previewing
//! Previewing ─stop / decode→ Stopped ─start→ Previewing
//! any ─dispose / device failure→ Closing → Closed
//! open or configure failure → Failed
//! ```

mod events;
mod responder;
mod state;
mod worker;

pub use events::{ScanResult, SessionEvent};
pub use responder::{Pending, Responder};
pub use state::SessionState;

use crate::backends::camera::{CameraPlatform, DecodeMode, RenderTargetProvider};
use crate::constants::{
    CALLBACK_THREAD_NAME, DEFAULT_FRAME_READER_CAPACITY, DEFAULT_MAX_DECODE_DIMENSION,
    ResolutionPreset,
};
use crate::errors::{SessionError, SessionResult};
use crate::frame_processor::{DecoderFactory, DefaultDecoderFactory};
use events::EventSink;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use worker::{Command, Message, SessionWorker};

/// Parameters of an open request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub camera_id: String,
    #[serde(default)]
    pub preset: ResolutionPreset,
    /// Symbol format names; empty means QR only
    #[serde(default)]
    pub formats: Vec<String>,
}

impl OpenRequest {
    pub fn new(camera_id: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            preset: ResolutionPreset::default(),
            formats: Vec::new(),
        }
    }

    pub fn with_preset(mut self, preset: ResolutionPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_formats<S: Into<String>>(mut self, formats: impl IntoIterator<Item = S>) -> Self {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }
}

/// Reply to a successful open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub texture_id: u64,
    pub preview_width: u32,
    pub preview_height: u32,
}

/// Collaborators a session is built from
#[derive(Clone)]
pub struct SessionDeps {
    pub platform: Arc<dyn CameraPlatform>,
    pub render_targets: Arc<dyn RenderTargetProvider>,
    pub decoders: Arc<dyn DecoderFactory>,
}

impl SessionDeps {
    /// Uses the built-in decoders
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        render_targets: Arc<dyn RenderTargetProvider>,
    ) -> Self {
        Self {
            platform,
            render_targets,
            decoders: Arc::new(DefaultDecoderFactory),
        }
    }

    pub fn with_decoders(mut self, decoders: Arc<dyn DecoderFactory>) -> Self {
        self.decoders = decoders;
        self
    }
}

/// Tunables applied to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Frame reader pool size
    pub frame_reader_capacity: usize,
    pub decode_mode: DecodeMode,
    /// Frames larger than this on either side are downscaled before decoding
    pub max_decode_dimension: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            frame_reader_capacity: DEFAULT_FRAME_READER_CAPACITY,
            decode_mode: DecodeMode::default(),
            max_decode_dimension: DEFAULT_MAX_DECODE_DIMENSION,
        }
    }
}

/// Handle to one scan session
///
/// Dropping the controller tears down anything still open and joins the
/// session worker.
pub struct SessionController {
    queue: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<SessionState>,
    events: EventSink,
    results: Mutex<Option<mpsc::UnboundedReceiver<ScanResult>>>,
    worker: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Start the session worker; the session begins `Idle`
    pub fn new(deps: SessionDeps, settings: SessionSettings) -> SessionResult<Self> {
        let (queue, inbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let events = EventSink::default();

        let worker = SessionWorker::new(
            deps,
            settings,
            queue.clone(),
            state_tx,
            events.clone(),
            results_tx,
        );
        let handle = thread::Builder::new()
            .name(CALLBACK_THREAD_NAME.to_string())
            .spawn(move || worker.run(inbox))
            .map_err(|e| SessionError::Service(format!("Failed to start session worker: {}", e)))?;

        Ok(Self {
            queue,
            state: state_rx,
            events,
            results: Mutex::new(Some(results_rx)),
            worker: Some(handle),
        })
    }

    /// Open a camera; resolves once the preview is running
    pub fn open(&self, request: OpenRequest) -> Pending<SessionInfo> {
        let (responder, pending) = Responder::channel();
        self.post(Command::Open { request, responder });
        pending
    }

    /// Resume repeating capture after a stop; resolves to the texture id
    pub fn start_preview(&self) -> Pending<u64> {
        let (responder, pending) = Responder::channel();
        self.post(Command::StartPreview(responder));
        pending
    }

    /// Halt repeating capture, keeping the session; resolves to the texture id
    pub fn stop_preview(&self) -> Pending<u64> {
        let (responder, pending) = Responder::channel();
        self.post(Command::StopPreview(responder));
        pending
    }

    /// Release all hardware and the render target; idempotent
    pub fn dispose(&self) -> Pending<()> {
        let (responder, pending) = Responder::channel();
        self.post(Command::Dispose(responder));
        pending
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`
    pub async fn wait_for_state(&self, target: SessionState) -> SessionResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::not_initialized())
    }

    /// Attach an event subscriber, replacing the previous one
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Scan result receiver; handed out once
    pub fn take_results(&self) -> Option<mpsc::UnboundedReceiver<ScanResult>> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn post(&self, command: Command) {
        if self.queue.send(Message::Command(command)).is_err() {
            // The responder inside the message is dropped, failing the Pending
            warn!("Session worker is gone");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let _ = self.queue.send(Message::Shutdown);
        if let Some(handle) = self.worker.take() {
            debug!("Waiting for session worker");
            if handle.join().is_err() {
                warn!("Session worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .finish()
    }
}
