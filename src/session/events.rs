// SPDX-License-Identifier: GPL-3.0-only

//! Session events and scan results

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Out-of-band notification about the session's hardware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    /// The platform confirmed the device is closed
    Closing,
    /// Fatal device failure; the session has been torn down
    Error { description: String },
}

impl SessionEvent {
    pub fn error(description: impl Into<String>) -> Self {
        SessionEvent::Error {
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SessionEvent::Error { .. })
    }
}

/// Decoded payload of one preview cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub text: String,
}

/// Replaceable subscriber for session events
///
/// Delivery is best effort: events emitted without a live subscriber are
/// dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    subscriber: Arc<Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>>,
}

impl EventSink {
    /// Attach a new subscriber, detaching the previous one
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriber = self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscriber.replace(tx).is_some() {
            debug!("Replacing event subscriber");
        }
        rx
    }

    pub fn emit(&self, event: SessionEvent) {
        let mut subscriber = self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = subscriber.as_ref() else {
            debug!(?event, "No event subscriber, dropping event");
            return;
        };
        if tx.send(event).is_err() {
            debug!("Event subscriber went away");
            *subscriber = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        let closing = serde_json::to_value(SessionEvent::Closing).unwrap();
        assert_eq!(closing, serde_json::json!({ "type": "closing" }));

        let error = serde_json::to_value(SessionEvent::error("The camera was disconnected.")).unwrap();
        assert_eq!(
            error,
            serde_json::json!({ "type": "error", "description": "The camera was disconnected." })
        );
    }

    #[test]
    fn latest_subscriber_receives_events() {
        let sink = EventSink::default();
        sink.emit(SessionEvent::Closing);

        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        sink.emit(SessionEvent::error("boom"));

        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), SessionEvent::error("boom"));
    }

    #[test]
    fn dropped_subscriber_is_detached() {
        let sink = EventSink::default();
        drop(sink.subscribe());
        sink.emit(SessionEvent::Closing);
        sink.emit(SessionEvent::Closing);
        let mut rx = sink.subscribe();
        sink.emit(SessionEvent::Closing);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Closing);
    }
}
