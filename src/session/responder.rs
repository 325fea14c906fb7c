// SPDX-License-Identifier: GPL-3.0-only

//! Reply continuations for session operations

use crate::errors::{SessionError, SessionResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// Where the outcome of a queued operation goes
#[derive(Debug)]
pub enum Responder<T> {
    Channel(oneshot::Sender<SessionResult<T>>),
    /// Internal operations whose outcome nobody awaits
    Discard,
}

impl<T> Responder<T> {
    /// Responder paired with the future the caller awaits
    pub fn channel() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        (Responder::Channel(tx), Pending { rx })
    }

    pub fn discard() -> Self {
        Responder::Discard
    }

    /// Deliver the outcome; a caller that stopped waiting is ignored
    pub fn send(self, result: SessionResult<T>) {
        match self {
            Responder::Channel(tx) => {
                if tx.send(result).is_err() {
                    debug!("Caller no longer waiting for reply");
                }
            }
            Responder::Discard => {
                if let Err(e) = result {
                    debug!(error = %e, "Internal operation failed");
                }
            }
        }
    }
}

/// Outcome of a session operation that has been queued
///
/// Resolves with `NotReady` if the session worker is gone before replying.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<SessionResult<T>>,
}

impl<T> Future for Pending<T> {
    type Output = SessionResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or_else(|_| Err(SessionError::not_initialized())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_reaches_pending() {
        let (responder, pending) = Responder::channel();
        responder.send(Ok(7u64));
        assert_eq!(pending.await, Ok(7));
    }

    #[tokio::test]
    async fn dropped_responder_is_not_ready() {
        let (responder, pending) = Responder::<()>::channel();
        drop(responder);
        assert_eq!(pending.await.unwrap_err().code(), "NotReady");
    }

    #[test]
    fn discard_swallows_errors() {
        Responder::<()>::discard().send(Err(SessionError::not_initialized()));
    }
}
