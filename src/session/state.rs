// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a scan session
///
/// Only the session worker mutates it; callers observe it through a watch
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    /// Waiting for the device-opened callback
    Opening,
    /// Waiting for the capture session to be configured
    Configuring,
    /// Repeating capture running, frames are decoded
    Previewing,
    /// Capture session kept, repeating request halted
    Stopped,
    /// Teardown in progress
    Closing,
    Closed,
    /// Open or configure failed; hardware already released
    Failed,
}

impl SessionState {
    /// No further transition except dispose is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Open has been requested and has not completed or failed yet
    pub fn is_opening(&self) -> bool {
        matches!(self, SessionState::Opening | SessionState::Configuring)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Configuring => "configuring",
            SessionState::Previewing => "previewing",
            SessionState::Stopped => "stopped",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
