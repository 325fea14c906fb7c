// SPDX-License-Identifier: GPL-3.0-only
//! Thread driving the repeating capture of a virtual capture session
//!
//! One pump runs per repeating request. Each tick produces one capture; the
//! pump parks between ticks so stopping it does not wait a full interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned by the tick closure to control the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Controller for a pump thread
///
/// # Example
///
/// ```ignore
/// let pump = FramePump::start("virtual-capture-0", interval, move || {
///     if shared.capture(&camera_id) {
///         LoopAction::Continue
///     } else {
///         LoopAction::Stop
///     }
/// })?;
///
/// // Later
/// pump.stop();
/// ```
pub struct FramePump {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FramePump {
    /// Start calling `tick` every `interval` on a new thread
    pub fn start<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, ?interval, "Starting frame pump");

        let thread_handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            debug!(name = %name_clone, "Frame pump thread started");

            loop {
                thread::park_timeout(interval);

                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                if tick() == LoopAction::Stop {
                    debug!(name = %name_clone, "Pump requested stop");
                    break;
                }
            }

            debug!(name = %name_clone, "Frame pump thread exiting");
        })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Signal the thread and wait for it to exit
    ///
    /// Must not be called while holding a lock the tick closure takes.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            debug!(name = %self.name, "Waiting for frame pump thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, ?e, "Frame pump thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn pump_ticks_until_stopped() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);

        let mut pump = FramePump::start("test-pump", Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            LoopAction::Continue
        })
        .unwrap();

        while ticks.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        pump.stop();
        assert!(!pump.is_running());

        let after_stop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn pump_stops_itself() {
        let mut pump = FramePump::start("test-pump-self", Duration::from_millis(1), || {
            LoopAction::Stop
        })
        .unwrap();
        while pump.is_running() {
            thread::sleep(Duration::from_millis(1));
        }
        pump.stop();
    }

    #[test]
    fn stop_does_not_wait_for_interval() {
        let mut pump = FramePump::start("test-pump-slow", Duration::from_secs(60), || {
            LoopAction::Continue
        })
        .unwrap();
        let started = std::time::Instant::now();
        pump.stop();
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
