// SPDX-License-Identifier: GPL-3.0-only

//! Per-capture decode driver
//!
//! Runs on every capture-completed callback. The newest frame is pulled from
//! the frame reader, decoded (inline or on a dedicated decode thread) and
//! released before the callback returns.

use super::FrameReader;
use crate::constants::DECODE_THREAD_NAME;
use crate::errors::{SessionError, SessionResult};
use crate::frame_processor::{FrameDecoder, OwnedLumaFrame};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Where decode work runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// On the hardware-callback thread; a slow decoder throttles capture
    #[default]
    Inline,
    /// On a decode thread fed through a single-slot latest-frame mailbox
    Offloaded,
}

/// What a capture-completed callback led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Not previewing or no reader attached
    Ignored,
    /// Nothing to acquire from the reader
    NoFrame,
    /// Frame decoded without a match, or its plane was unusable
    NoMatch,
    /// Inline decode produced text
    Decoded(String),
    /// Frame handed to the decode thread
    Submitted,
}

enum DecodeStage {
    Inline(Box<dyn FrameDecoder>),
    Offloaded(DecodeWorker),
}

/// Decode side of the repeating capture
pub struct CaptureLoop {
    stage: DecodeStage,
    frames_processed: u64,
}

impl CaptureLoop {
    /// Decode on the calling thread
    pub fn inline(decoder: Box<dyn FrameDecoder>) -> Self {
        Self {
            stage: DecodeStage::Inline(decoder),
            frames_processed: 0,
        }
    }

    /// Decode on a dedicated thread
    ///
    /// `on_result` is called from that thread with the preview cycle the
    /// frame belonged to and the decoded text.
    pub fn offloaded<F>(decoder: Box<dyn FrameDecoder>, on_result: F) -> SessionResult<Self>
    where
        F: Fn(u64, String) + Send + 'static,
    {
        let worker = DecodeWorker::spawn(decoder, on_result)?;
        Ok(Self {
            stage: DecodeStage::Offloaded(worker),
            frames_processed: 0,
        })
    }

    pub fn mode(&self) -> DecodeMode {
        match self.stage {
            DecodeStage::Inline(_) => DecodeMode::Inline,
            DecodeStage::Offloaded(_) => DecodeMode::Offloaded,
        }
    }

    /// Frames acquired and decoded or submitted so far
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Handle one capture-completed notification
    ///
    /// The acquired frame is always released before this returns.
    pub fn on_capture_completed(
        &mut self,
        previewing: bool,
        cycle: u64,
        reader: Option<&mut (dyn FrameReader + 'static)>,
    ) -> CaptureOutcome {
        if !previewing {
            trace!("Capture completed while not previewing");
            return CaptureOutcome::Ignored;
        }
        let Some(reader) = reader else {
            return CaptureOutcome::Ignored;
        };
        let Some(frame) = reader.acquire_latest() else {
            return CaptureOutcome::NoFrame;
        };
        self.frames_processed += 1;

        let outcome = match frame.luma() {
            None => {
                debug!(
                    width = frame.width,
                    height = frame.height,
                    "Frame has no usable luminance plane"
                );
                CaptureOutcome::NoMatch
            }
            Some(luma) => match &mut self.stage {
                DecodeStage::Inline(decoder) => match decoder.decode(&luma) {
                    Some(text) if !text.is_empty() => CaptureOutcome::Decoded(text),
                    _ => CaptureOutcome::NoMatch,
                },
                DecodeStage::Offloaded(worker) => {
                    worker.submit(cycle, luma.to_owned_frame());
                    CaptureOutcome::Submitted
                }
            },
        };
        drop(frame);
        outcome
    }
}

impl std::fmt::Debug for CaptureLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLoop")
            .field("mode", &self.mode())
            .field("frames_processed", &self.frames_processed)
            .finish()
    }
}

#[derive(Default)]
struct Mailbox {
    slot: Option<(u64, OwnedLumaFrame)>,
    shutdown: bool,
}

/// Decode thread with a single-slot mailbox
///
/// A frame submitted while the previous one is still waiting replaces it, so
/// the backlog never exceeds one frame.
struct DecodeWorker {
    shared: Arc<(Mutex<Mailbox>, Condvar)>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    fn spawn<F>(mut decoder: Box<dyn FrameDecoder>, on_result: F) -> SessionResult<Self>
    where
        F: Fn(u64, String) + Send + 'static,
    {
        let shared = Arc::new((Mutex::new(Mailbox::default()), Condvar::new()));
        let thread_shared = Arc::clone(&shared);

        let thread_handle = thread::Builder::new()
            .name(DECODE_THREAD_NAME.to_string())
            .spawn(move || {
                debug!("Decode thread started");
                let (lock, ready) = &*thread_shared;
                loop {
                    let next = {
                        let mut mailbox = lock.lock().unwrap_or_else(PoisonError::into_inner);
                        while mailbox.slot.is_none() && !mailbox.shutdown {
                            mailbox = ready.wait(mailbox).unwrap_or_else(PoisonError::into_inner);
                        }
                        if mailbox.shutdown {
                            break;
                        }
                        mailbox.slot.take()
                    };
                    let Some((cycle, frame)) = next else {
                        continue;
                    };
                    let Some(luma) = frame.as_luma() else {
                        continue;
                    };
                    if let Some(text) = decoder.decode(&luma)
                        && !text.is_empty()
                    {
                        on_result(cycle, text);
                    }
                }
                debug!("Decode thread exiting");
            })
            .map_err(|e| SessionError::Service(format!("Failed to start decode thread: {}", e)))?;

        Ok(Self {
            shared,
            thread_handle: Some(thread_handle),
        })
    }

    fn submit(&self, cycle: u64, frame: OwnedLumaFrame) {
        let (lock, ready) = &*self.shared;
        let mut mailbox = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if mailbox.slot.is_some() {
            trace!("Replacing frame still waiting for decode");
        }
        mailbox.slot = Some((cycle, frame));
        ready.notify_one();
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        {
            let (lock, ready) = &*self.shared;
            let mut mailbox = lock.lock().unwrap_or_else(PoisonError::into_inner);
            mailbox.shutdown = true;
            mailbox.slot = None;
            ready.notify_all();
        }
        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            warn!("Decode thread panicked");
        }
    }
}
