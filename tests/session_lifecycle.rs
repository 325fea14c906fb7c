// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the scan session lifecycle
//!
//! Sessions run against the virtual camera in manual capture mode, so every
//! frame is produced by an explicit `trigger_capture`. Scenes carry their
//! "symbol" as uppercase ASCII at the start of the first row.

use camera_scanner::backends::camera::{BackendError, DecodeMode, DeviceErrorCode, TextureRegistry};
use camera_scanner::backends::virtual_camera::{
    ConfigureBehavior, OpenBehavior, VirtualCamera, default_devices,
};
use camera_scanner::frame_processor::{
    DecoderFactory, FrameDecoder, LumaFrame, OwnedLumaFrame, SymbolFormat,
};
use camera_scanner::{
    OpenRequest, ResolutionPreset, ScanResult, SessionController, SessionDeps, SessionEvent,
    SessionSettings, SessionState,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

/// Reads leading uppercase ASCII from the first row
struct MarkerDecoder {
    formats: Vec<SymbolFormat>,
}

impl FrameDecoder for MarkerDecoder {
    fn decode(&mut self, frame: &LumaFrame<'_>) -> Option<String> {
        let row = &frame.data()[..frame.width() as usize];
        let text: String = row
            .iter()
            .take_while(|b| b.is_ascii_uppercase())
            .map(|&b| b as char)
            .collect();
        (!text.is_empty()).then_some(text)
    }

    fn formats(&self) -> &[SymbolFormat] {
        &self.formats
    }
}

struct MarkerFactory;

impl DecoderFactory for MarkerFactory {
    fn create(&self, formats: &[SymbolFormat], _max_dimension: u32) -> Box<dyn FrameDecoder> {
        Box::new(MarkerDecoder {
            formats: formats.to_vec(),
        })
    }
}

fn marker_scene(text: &str) -> OwnedLumaFrame {
    let (width, height) = (64u32, 16u32);
    let mut data = vec![200u8; (width * height) as usize];
    data[..text.len()].copy_from_slice(text.as_bytes());
    OwnedLumaFrame {
        data,
        width,
        height,
    }
}

struct Rig {
    camera: VirtualCamera,
    textures: Arc<TextureRegistry>,
    controller: SessionController,
    results: mpsc::UnboundedReceiver<ScanResult>,
}

impl Rig {
    fn new(camera: &VirtualCamera, settings: SessionSettings) -> Self {
        let textures = Arc::new(TextureRegistry::new());
        let deps = SessionDeps::new(Arc::new(camera.clone()), textures.clone())
            .with_decoders(Arc::new(MarkerFactory));
        let controller = SessionController::new(deps, settings).unwrap();
        let results = controller.take_results().unwrap();
        Self {
            camera: camera.clone(),
            textures,
            controller,
            results,
        }
    }

    fn manual() -> Self {
        Self::new(&VirtualCamera::default(), SessionSettings::default())
    }

    async fn next_result(&mut self) -> String {
        within(self.results.recv()).await.unwrap().text
    }

    /// Round-trip through the worker queue so earlier callbacks are handled
    async fn settle(&self) {
        within(self.controller.dispose()).await.unwrap();
    }
}

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out waiting for the session")
}

fn error_count(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> usize {
    let mut errors = 0;
    while let Ok(event) = events.try_recv() {
        if event.is_error() {
            errors += 1;
        }
    }
    errors
}

#[tokio::test]
async fn test_open_reaches_previewing() {
    let rig = Rig::manual();

    let info = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    assert!(info.texture_id > 0);
    assert_eq!((info.preview_width, info.preview_height), (1280, 720));
    assert_eq!(rig.controller.state(), SessionState::Previewing);
    assert!(rig.camera.is_repeating("0"));
    assert!(rig.textures.is_live(info.texture_id));
}

#[tokio::test]
async fn test_decode_stops_preview() {
    let mut rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    rig.camera.set_scene("0", Some(&marker_scene("HELLO")));
    assert!(rig.camera.trigger_capture("0"));

    assert_eq!(rig.next_result().await, "HELLO");
    assert_eq!(rig.controller.state(), SessionState::Stopped);
    assert!(!rig.camera.is_repeating("0"));
    assert!(rig.camera.is_open("0"), "Auto-stop keeps the device open");
    assert_eq!(rig.camera.frames_in_flight(), 0);
}

#[tokio::test]
async fn test_blank_frames_produce_nothing() {
    let mut rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    for _ in 0..3 {
        assert!(rig.camera.trigger_capture("0"));
    }
    rig.settle().await;

    assert!(rig.results.try_recv().is_err());
    assert_eq!(rig.camera.frames_in_flight(), 0);
}

#[tokio::test]
async fn test_burst_delivers_one_result() {
    let mut rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    rig.camera.set_scene("0", Some(&marker_scene("BURST")));
    for _ in 0..8 {
        rig.camera.trigger_capture("0");
    }

    assert_eq!(rig.next_result().await, "BURST");
    rig.settle().await;
    assert!(rig.results.try_recv().is_err(), "Only the first decode is reported");
    assert_eq!(rig.camera.frames_in_flight(), 0);
}

#[tokio::test]
async fn test_no_decode_after_stop() {
    let mut rig = Rig::manual();
    let info = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    let texture_id = within(rig.controller.stop_preview()).await.unwrap();
    assert_eq!(texture_id, info.texture_id);
    assert_eq!(rig.controller.state(), SessionState::Stopped);

    rig.camera.set_scene("0", Some(&marker_scene("LATE")));
    assert!(!rig.camera.trigger_capture("0"), "No repeating request after stop");

    // A completion already in flight when the request was stopped
    assert!(rig.camera.post_stray_capture("0"));
    rig.settle().await;
    assert!(rig.results.try_recv().is_err());
    assert_eq!(rig.camera.frames_in_flight(), 0);
}

#[tokio::test]
async fn test_stray_capture_decodes_while_previewing() {
    let mut rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    rig.camera.set_scene("0", Some(&marker_scene("STRAY")));
    assert!(rig.camera.post_stray_capture("0"));
    assert_eq!(rig.next_result().await, "STRAY");
}

#[tokio::test]
async fn test_restart_after_decode() {
    let mut rig = Rig::manual();
    let info = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    rig.camera.set_scene("0", Some(&marker_scene("FIRST")));
    rig.camera.trigger_capture("0");
    assert_eq!(rig.next_result().await, "FIRST");

    let texture_id = within(rig.controller.start_preview()).await.unwrap();
    assert_eq!(texture_id, info.texture_id);
    assert_eq!(rig.controller.state(), SessionState::Previewing);

    rig.camera.set_scene("0", Some(&marker_scene("SECOND")));
    rig.camera.trigger_capture("0");
    assert_eq!(rig.next_result().await, "SECOND");
}

#[tokio::test]
async fn test_preview_transitions_are_checked() {
    let rig = Rig::manual();

    let err = within(rig.controller.stop_preview()).await.unwrap_err();
    assert_eq!(err.code(), "NotReady");

    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();
    let err = within(rig.controller.start_preview()).await.unwrap_err();
    assert_eq!(err.code(), "NotReady");
    assert_eq!(rig.controller.state(), SessionState::Previewing);
}

#[tokio::test]
async fn test_open_only_from_idle() {
    let rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    let err = within(rig.controller.open(OpenRequest::new("1"))).await.unwrap_err();
    assert_eq!(err.code(), "NotReady");
    assert_eq!(rig.controller.state(), SessionState::Previewing);
    assert!(!rig.camera.is_open("1"));
}

#[tokio::test]
async fn test_preview_capped_at_high() {
    let rig = Rig::manual();

    let info = within(
        rig.controller
            .open(OpenRequest::new("0").with_preset(ResolutionPreset::Max)),
    )
    .await
    .unwrap();

    assert_eq!((info.preview_width, info.preview_height), (1280, 720));
}

#[tokio::test]
async fn test_low_preset_uses_qvga() {
    let rig = Rig::manual();

    let info = within(
        rig.controller
            .open(OpenRequest::new("1").with_preset(ResolutionPreset::Low)),
    )
    .await
    .unwrap();

    assert_eq!((info.preview_width, info.preview_height), (320, 240));
}

#[tokio::test]
async fn test_disconnect_closes_session() {
    let mut rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();
    let mut events = rig.controller.subscribe_events();

    rig.camera.set_scene("0", Some(&marker_scene("GONE")));
    assert!(rig.camera.disconnect("0"));
    within(rig.controller.wait_for_state(SessionState::Closed))
        .await
        .unwrap();
    rig.settle().await;

    assert_eq!(rig.controller.state(), SessionState::Closed);
    assert_eq!(error_count(&mut events), 1);
    assert!(rig.results.try_recv().is_err());
    assert!(!rig.camera.is_open("0"));
    assert_eq!(rig.camera.device_closes(), 1);
    assert_eq!(rig.textures.live_count(), 0);
}

#[tokio::test]
async fn test_device_error_reports_description() {
    let rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();
    let mut events = rig.controller.subscribe_events();

    assert!(rig.camera.fail("0", DeviceErrorCode::FatalDevice));
    within(rig.controller.wait_for_state(SessionState::Closed))
        .await
        .unwrap();

    let event = within(events.recv()).await.unwrap();
    assert_eq!(
        event,
        SessionEvent::error("The camera device has encountered a fatal error")
    );
}

#[tokio::test]
async fn test_open_close_cycles_release_everything() {
    let camera = VirtualCamera::default();

    for _ in 0..5 {
        let rig = Rig::new(&camera, SessionSettings::default());
        within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();
        rig.camera.trigger_capture("0");
        within(rig.controller.dispose()).await.unwrap();
        assert_eq!(rig.controller.state(), SessionState::Closed);
        assert_eq!(rig.textures.live_count(), 0);
    }

    assert_eq!(camera.device_opens(), 5);
    assert_eq!(camera.device_closes(), 5);
    assert_eq!(camera.open_readers(), 0);
    assert_eq!(camera.frames_in_flight(), 0);
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let rig = Rig::manual();
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    within(rig.controller.dispose()).await.unwrap();
    within(rig.controller.dispose()).await.unwrap();

    assert_eq!(rig.controller.state(), SessionState::Closed);
    assert_eq!(rig.camera.device_closes(), 1);

    let err = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap_err();
    assert_eq!(err.code(), "NotReady");
}

#[tokio::test]
async fn test_dispose_before_open() {
    let rig = Rig::manual();

    within(rig.controller.dispose()).await.unwrap();

    assert_eq!(rig.controller.state(), SessionState::Closed);
    assert_eq!(rig.camera.device_opens(), 0);
}

#[tokio::test]
async fn test_configure_failure_fails_session() {
    let camera = VirtualCamera::default();
    camera.set_configure_behavior("0", ConfigureBehavior::Fail);
    let rig = Rig::new(&camera, SessionSettings::default());

    let err = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap_err();

    assert_eq!(err.code(), "CameraConfiguration");
    assert_eq!(err.description(), "Failed to configure camera session.");
    assert_eq!(rig.controller.state(), SessionState::Failed);
    assert!(!camera.is_open("0"));
    assert_eq!(rig.textures.live_count(), 0);
    assert_eq!(camera.open_readers(), 0);

    // Failed stays Failed
    within(rig.controller.dispose()).await.unwrap();
    assert_eq!(rig.controller.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_refused_open_fails_session() {
    let camera = VirtualCamera::default();
    camera.set_open_behavior("0", OpenBehavior::Refuse(BackendError::Disabled));
    let rig = Rig::new(&camera, SessionSettings::default());

    let err = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap_err();

    assert_eq!(err.code(), "CameraAccess");
    assert_eq!(rig.controller.state(), SessionState::Failed);
    assert_eq!(rig.textures.live_count(), 0);
    assert_eq!(camera.open_readers(), 0);
}

#[tokio::test]
async fn test_unknown_camera_is_rejected() {
    let rig = Rig::manual();

    let err = within(rig.controller.open(OpenRequest::new("7"))).await.unwrap_err();

    assert_eq!(err.code(), "NoProfileAvailable");
    assert_eq!(rig.controller.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_unknown_format_is_rejected() {
    let rig = Rig::manual();

    let err = within(
        rig.controller
            .open(OpenRequest::new("0").with_formats(["qr", "hologram"])),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "UnknownFormat");
    assert_eq!(rig.camera.device_opens(), 0);
}

#[tokio::test]
async fn test_camera_in_use_fails_second_session() {
    let camera = VirtualCamera::new(default_devices());
    let first = Rig::new(&camera, SessionSettings::default());
    let second = Rig::new(&camera, SessionSettings::default());

    within(first.controller.open(OpenRequest::new("0"))).await.unwrap();
    let err = within(second.controller.open(OpenRequest::new("0")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CameraAccess");
    assert_eq!(second.controller.state(), SessionState::Failed);
    assert_eq!(first.controller.state(), SessionState::Previewing);
    assert!(camera.is_open("0"));
}

#[tokio::test]
async fn test_device_error_while_opening_fails_session() {
    let camera = VirtualCamera::default();
    camera.set_open_behavior("0", OpenBehavior::Fail(DeviceErrorCode::FatalDevice));
    let rig = Rig::new(&camera, SessionSettings::default());
    let mut events = rig.controller.subscribe_events();

    let err = within(rig.controller.open(OpenRequest::new("0"))).await.unwrap_err();

    // Already terminal when the rejection arrives
    assert_eq!(rig.controller.state(), SessionState::Failed);
    assert_eq!(err.code(), "CameraDevice");
    assert_eq!(
        err.description(),
        "The camera device has encountered a fatal error"
    );
    rig.settle().await;
    assert_eq!(rig.controller.state(), SessionState::Failed);
    assert_eq!(error_count(&mut events), 1);
    assert_eq!(rig.textures.live_count(), 0);
    assert_eq!(camera.open_readers(), 0);
}

#[tokio::test]
async fn test_dispose_while_opening_rejects_open() {
    let rig = Rig::manual();

    let opening = rig.controller.open(OpenRequest::new("0"));
    let disposed = rig.controller.dispose();

    // The worker may finish opening before it sees the dispose
    if let Err(err) = within(opening).await {
        assert_eq!(err.code(), "NotReady");
        assert_eq!(rig.controller.state(), SessionState::Closed);
    }
    within(disposed).await.unwrap();
    assert_eq!(rig.controller.state(), SessionState::Closed);
    rig.settle().await;
    assert!(!rig.camera.is_open("0"));
    assert_eq!(rig.textures.live_count(), 0);
}

#[tokio::test]
async fn test_offloaded_decode() {
    let settings = SessionSettings {
        decode_mode: DecodeMode::Offloaded,
        ..SessionSettings::default()
    };
    let mut rig = Rig::new(&VirtualCamera::default(), settings);
    within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();

    rig.camera.set_scene("0", Some(&marker_scene("OFFLOAD")));
    for _ in 0..4 {
        rig.camera.trigger_capture("0");
    }

    assert_eq!(rig.next_result().await, "OFFLOAD");
    assert_eq!(rig.controller.state(), SessionState::Stopped);
    rig.settle().await;
    assert!(rig.results.try_recv().is_err());
    assert_eq!(rig.camera.frames_in_flight(), 0);
}

#[tokio::test]
async fn test_drop_releases_hardware() {
    let camera = VirtualCamera::default();
    {
        let rig = Rig::new(&camera, SessionSettings::default());
        within(rig.controller.open(OpenRequest::new("0"))).await.unwrap();
    }

    assert!(!camera.is_open("0"));
    assert_eq!(camera.device_closes(), 1);
    assert_eq!(camera.open_readers(), 0);
}
