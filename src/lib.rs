// SPDX-License-Identifier: MPL-2.0

//! Camera Scanner - live camera preview with continuous barcode decoding
//!
//! A scan session opens a camera, streams a preview into a host-provided
//! render target and decodes every captured frame until a symbol is found,
//! then stops the preview and reports the decoded text.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera platform traits, hardware session, capture loop
//!   and the in-process virtual camera
//! - [`frame_processor`]: Luminance frames and symbol decoders
//! - [`session`]: Session state machine and its callback worker
//! - [`bridge`]: Method-call surface for host bindings
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let camera = Arc::new(VirtualCamera::default());
//! let deps = SessionDeps::new(camera, Arc::new(TextureRegistry::new()));
//! let controller = SessionController::new(deps, SessionSettings::default())?;
//! let info = controller.open(OpenRequest::new("0")).await?;
//! ```

pub mod backends;
pub mod bridge;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod session;

// Re-export commonly used types
pub use bridge::{HostError, HostNotification, MethodCall, ScannerHost};
pub use config::Config;
pub use constants::ResolutionPreset;
pub use errors::{SessionError, SessionResult};
pub use session::{
    OpenRequest, ScanResult, SessionController, SessionDeps, SessionEvent, SessionInfo,
    SessionSettings, SessionState,
};
