// SPDX-License-Identifier: GPL-3.0-only

//! In-process camera platform
//!
//! Behaves like an asynchronous camera stack: device opens, session
//! configuration and capture completions are all posted back through
//! [`PlatformCallbacks`] instead of returning inline. Each camera shows a
//! "scene" (a luminance image, blank by default) that every capture copies
//! into the frame readers targeted by the repeating request.
//!
//! # Architecture
//!
//! ```text
//!  set_scene / show_image
//!          │
//!          ▼
//! ┌──────────────────┐   capture()   ┌──────────────────┐
//! │ FramePump or     │ ────────────▶ │ VirtualFrameReader│ ← bounded pool
//! │ trigger_capture  │               └──────────────────┘
//! └──────────────────┘
//!          │ capture_completed
//!          ▼
//!   PlatformCallbacks  → session worker queue
//! ```
//!
//! Without a frame interval nothing is captured until `trigger_capture`
//! is called, which keeps tests deterministic.

mod device;
mod file_source;
mod frame_pump;
mod reader;

pub use device::{VirtualCaptureSession, VirtualDevice};
pub use file_source::{load_image_as_luma, luma_from_image};
pub use frame_pump::{FramePump, LoopAction};
pub use reader::VirtualFrameReader;

use crate::backends::camera::{
    BackendError, BackendResult, CameraDescription, CameraPlatform, DeviceErrorCode, FramePlane,
    FrameReader, FrameSize, LensFacing, PixelFormat, PlatformCallbacks, ProfileSource, Surface,
    SurfaceId, SurfaceKind,
};
use crate::constants::ProfileQuality;
use crate::frame_processor::OwnedLumaFrame;
use reader::{CapturedImage, FramePool, SharedPool, lock_pool};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Reader surface ids live above the render target id range
const READER_SURFACE_BASE: u64 = 1 << 32;

/// Luma value of a camera with nothing in view
const BLANK_LUMA: u8 = 16;

/// How a device answers an open request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OpenBehavior {
    #[default]
    Succeed,
    /// Refused synchronously by `open_device`
    Refuse(BackendError),
    /// Accepted, then reported through the device error callback
    Fail(DeviceErrorCode),
}

/// How a device answers a capture session request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigureBehavior {
    #[default]
    Succeed,
    /// Posts the configure-failed callback
    Fail,
}

/// A camera the virtual platform advertises
#[derive(Debug, Clone)]
pub struct VirtualDeviceSpec {
    pub id: String,
    pub sensor_orientation: u32,
    pub lens_facing: Option<LensFacing>,
    pub profiles: BTreeMap<ProfileQuality, FrameSize>,
    pub open_behavior: OpenBehavior,
    pub configure_behavior: ConfigureBehavior,
}

impl VirtualDeviceSpec {
    /// Camera with the standard profile table
    pub fn new(id: impl Into<String>, lens_facing: LensFacing) -> Self {
        let sensor_orientation = match lens_facing {
            LensFacing::Front => 270,
            LensFacing::Back | LensFacing::External => 90,
        };
        Self {
            id: id.into(),
            sensor_orientation,
            lens_facing: Some(lens_facing),
            profiles: standard_profiles(),
            open_behavior: OpenBehavior::default(),
            configure_behavior: ConfigureBehavior::default(),
        }
    }

    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = (ProfileQuality, FrameSize)>) -> Self {
        self.profiles = profiles.into_iter().collect();
        self
    }

    pub fn with_open_behavior(mut self, behavior: OpenBehavior) -> Self {
        self.open_behavior = behavior;
        self
    }

    pub fn with_configure_behavior(mut self, behavior: ConfigureBehavior) -> Self {
        self.configure_behavior = behavior;
        self
    }

    fn description(&self) -> CameraDescription {
        CameraDescription {
            name: self.id.clone(),
            sensor_orientation: self.sensor_orientation,
            lens_facing: self.lens_facing,
        }
    }
}

/// Profile table of a typical 1080p phone sensor
pub fn standard_profiles() -> BTreeMap<ProfileQuality, FrameSize> {
    BTreeMap::from([
        (ProfileQuality::Low, FrameSize::new(176, 144)),
        (ProfileQuality::Qvga, FrameSize::new(320, 240)),
        (ProfileQuality::P480, FrameSize::new(720, 480)),
        (ProfileQuality::P720, FrameSize::new(1280, 720)),
        (ProfileQuality::P1080, FrameSize::new(1920, 1080)),
        (ProfileQuality::High, FrameSize::new(1920, 1080)),
    ])
}

/// Back camera "0" and front camera "1"
pub fn default_devices() -> Vec<VirtualDeviceSpec> {
    vec![
        VirtualDeviceSpec::new("0", LensFacing::Back),
        VirtualDeviceSpec::new("1", LensFacing::Front),
    ]
}

/// Repeating request installed by a capture session
struct Repeating {
    session_id: u64,
    targets: Vec<SurfaceId>,
    callbacks: PlatformCallbacks,
}

#[derive(Default)]
struct Inner {
    devices: BTreeMap<String, VirtualDeviceSpec>,
    scenes: HashMap<String, CapturedImage>,
    blanks: HashMap<FrameSize, CapturedImage>,
    /// Device callbacks of every open camera
    open: HashMap<String, PlatformCallbacks>,
    repeating: HashMap<String, Repeating>,
    readers: HashMap<SurfaceId, (FrameSize, SharedPool)>,
}

impl Inner {
    fn image_for(&mut self, camera_id: &str, size: FrameSize) -> CapturedImage {
        if let Some(scene) = self.scenes.get(camera_id) {
            return scene.clone();
        }
        self.blanks
            .entry(size)
            .or_insert_with(|| {
                let plane = vec![BLANK_LUMA; size.area() as usize];
                yuv_from_luma(&plane, size.width, size.height)
            })
            .clone()
    }
}

/// State shared by the platform and every handle it gave out
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    frame_interval: Option<Duration>,
    next_reader_id: AtomicU64,
    next_session_id: AtomicU64,
    pub(crate) frames_in_flight: AtomicUsize,
    device_opens: AtomicUsize,
    device_closes: AtomicUsize,
    captures: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn unregister_reader(&self, surface: SurfaceId) {
        self.lock().readers.remove(&surface);
    }

    /// Release the device slot; returns false when it was not open
    pub(crate) fn release_device(&self, camera_id: &str) -> bool {
        let mut inner = self.lock();
        inner.repeating.remove(camera_id);
        let released = inner.open.remove(camera_id).is_some();
        if released {
            self.device_closes.fetch_add(1, Ordering::SeqCst);
        }
        released
    }

    pub(crate) fn is_open(&self, camera_id: &str) -> bool {
        self.lock().open.contains_key(camera_id)
    }

    pub(crate) fn configure_behavior(&self, camera_id: &str) -> ConfigureBehavior {
        self.lock()
            .devices
            .get(camera_id)
            .map(|spec| spec.configure_behavior)
            .unwrap_or_default()
    }

    /// Check every frame reader surface is live
    pub(crate) fn validate_surfaces(&self, surfaces: &[Surface]) -> BackendResult<()> {
        if surfaces.is_empty() {
            return Err(BackendError::InvalidSurfaces("No output surfaces".into()));
        }
        let inner = self.lock();
        for surface in surfaces {
            if surface.kind == SurfaceKind::FrameReader && !inner.readers.contains_key(&surface.id) {
                return Err(BackendError::InvalidSurfaces(format!(
                    "{} is not a live frame reader",
                    surface.id
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    pub(crate) fn set_repeating(
        &self,
        camera_id: &str,
        session_id: u64,
        targets: Vec<SurfaceId>,
        callbacks: PlatformCallbacks,
    ) {
        self.lock().repeating.insert(
            camera_id.to_string(),
            Repeating {
                session_id,
                targets,
                callbacks,
            },
        );
    }

    /// Remove the repeating request if `session_id` installed it
    pub(crate) fn clear_repeating(&self, camera_id: &str, session_id: u64) {
        let mut inner = self.lock();
        if inner
            .repeating
            .get(camera_id)
            .is_some_and(|repeating| repeating.session_id == session_id)
        {
            inner.repeating.remove(camera_id);
        }
    }

    /// Run one capture of the repeating request; false when none is installed
    pub(crate) fn capture(&self, camera_id: &str) -> bool {
        let callbacks = {
            let mut inner = self.lock();
            let Some(repeating) = inner.repeating.get(camera_id) else {
                return false;
            };
            let callbacks = repeating.callbacks.clone();
            let targets = repeating.targets.clone();
            for target in targets {
                let Some((size, pool)) = inner.readers.get(&target).cloned() else {
                    continue;
                };
                let image = inner.image_for(camera_id, size);
                lock_pool(&pool).push(image);
            }
            callbacks
        };
        self.captures.fetch_add(1, Ordering::SeqCst);
        callbacks.capture_completed();
        true
    }
}

/// Virtual camera platform
///
/// Cloning yields another handle onto the same cameras, so tests can keep
/// one for control while a session owns the other.
#[derive(Clone)]
pub struct VirtualCamera {
    shared: Arc<Shared>,
}

impl VirtualCamera {
    /// Cameras that capture only on `trigger_capture`
    pub fn new(devices: Vec<VirtualDeviceSpec>) -> Self {
        Self::build(devices, None)
    }

    /// Cameras that capture continuously while repeating
    pub fn streaming(devices: Vec<VirtualDeviceSpec>, frame_interval: Duration) -> Self {
        Self::build(devices, Some(frame_interval))
    }

    fn build(devices: Vec<VirtualDeviceSpec>, frame_interval: Option<Duration>) -> Self {
        let inner = Inner {
            devices: devices
                .into_iter()
                .map(|spec| (spec.id.clone(), spec))
                .collect(),
            ..Inner::default()
        };
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                frame_interval,
                next_reader_id: AtomicU64::new(0),
                next_session_id: AtomicU64::new(1),
                frames_in_flight: AtomicUsize::new(0),
                device_opens: AtomicUsize::new(0),
                device_closes: AtomicUsize::new(0),
                captures: AtomicU64::new(0),
            }),
        }
    }

    /// Show a luminance image to `camera_id`, or a blank view for `None`
    pub fn set_scene(&self, camera_id: &str, scene: Option<&OwnedLumaFrame>) {
        let mut inner = self.shared.lock();
        match scene {
            Some(frame) => {
                let image = yuv_from_luma(&frame.data, frame.width, frame.height);
                inner.scenes.insert(camera_id.to_string(), image);
            }
            None => {
                inner.scenes.remove(camera_id);
            }
        }
    }

    /// Load an image file and show it to `camera_id`
    pub fn show_image(&self, camera_id: &str, path: &Path) -> BackendResult<()> {
        let frame = load_image_as_luma(path)?;
        self.set_scene(camera_id, Some(&frame));
        Ok(())
    }

    /// Capture one frame if `camera_id` is repeating
    pub fn trigger_capture(&self, camera_id: &str) -> bool {
        self.shared.capture(camera_id)
    }

    /// Fill every live reader and post a capture completion through the
    /// device callbacks, whether or not a repeating request is installed.
    /// Models a completion already in flight when the request was stopped.
    /// False when `camera_id` is not open.
    pub fn post_stray_capture(&self, camera_id: &str) -> bool {
        let callbacks = {
            let mut inner = self.shared.lock();
            let Some(callbacks) = inner.open.get(camera_id).cloned() else {
                return false;
            };
            let readers: Vec<_> = inner.readers.values().cloned().collect();
            for (size, pool) in readers {
                let image = inner.image_for(camera_id, size);
                lock_pool(&pool).push(image);
            }
            callbacks
        };
        debug!(camera_id, "Posting stray capture completion");
        callbacks.capture_completed();
        true
    }

    pub fn set_open_behavior(&self, camera_id: &str, behavior: OpenBehavior) {
        if let Some(spec) = self.shared.lock().devices.get_mut(camera_id) {
            spec.open_behavior = behavior;
        }
    }

    pub fn set_configure_behavior(&self, camera_id: &str, behavior: ConfigureBehavior) {
        if let Some(spec) = self.shared.lock().devices.get_mut(camera_id) {
            spec.configure_behavior = behavior;
        }
    }

    /// Simulate the device being unplugged; false when it is not open
    pub fn disconnect(&self, camera_id: &str) -> bool {
        let callbacks = {
            let mut inner = self.shared.lock();
            inner.repeating.remove(camera_id);
            inner.open.get(camera_id).cloned()
        };
        match callbacks {
            Some(callbacks) => {
                info!(camera_id, "Disconnecting virtual camera");
                callbacks.device_disconnected();
                true
            }
            None => false,
        }
    }

    /// Simulate an asynchronous device error; false when it is not open
    pub fn fail(&self, camera_id: &str, code: DeviceErrorCode) -> bool {
        let callbacks = {
            let mut inner = self.shared.lock();
            inner.repeating.remove(camera_id);
            inner.open.get(camera_id).cloned()
        };
        match callbacks {
            Some(callbacks) => {
                info!(camera_id, ?code, "Failing virtual camera");
                callbacks.device_error(code);
                true
            }
            None => false,
        }
    }

    pub fn device_opens(&self) -> usize {
        self.shared.device_opens.load(Ordering::SeqCst)
    }

    pub fn device_closes(&self) -> usize {
        self.shared.device_closes.load(Ordering::SeqCst)
    }

    /// Frames acquired from readers and not yet released
    pub fn frames_in_flight(&self) -> usize {
        self.shared.frames_in_flight.load(Ordering::SeqCst)
    }

    /// Captures completed across all cameras
    pub fn captures(&self) -> u64 {
        self.shared.captures.load(Ordering::SeqCst)
    }

    pub fn is_open(&self, camera_id: &str) -> bool {
        self.shared.is_open(camera_id)
    }

    pub fn is_repeating(&self, camera_id: &str) -> bool {
        self.shared.lock().repeating.contains_key(camera_id)
    }

    /// Frame readers created and not yet closed
    pub fn open_readers(&self) -> usize {
        self.shared.lock().readers.len()
    }
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new(default_devices())
    }
}

impl ProfileSource for VirtualCamera {
    fn profile(&self, camera_id: &str, quality: ProfileQuality) -> Option<FrameSize> {
        self.shared
            .lock()
            .devices
            .get(camera_id)
            .and_then(|spec| spec.profiles.get(&quality).copied())
    }
}

impl CameraPlatform for VirtualCamera {
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDescription>> {
        Ok(self
            .shared
            .lock()
            .devices
            .values()
            .map(VirtualDeviceSpec::description)
            .collect())
    }

    fn create_frame_reader(
        &self,
        size: FrameSize,
        capacity: usize,
    ) -> BackendResult<Box<dyn FrameReader>> {
        if capacity == 0 {
            return Err(BackendError::Other(
                "Frame reader capacity must be at least 1".into(),
            ));
        }
        let id = SurfaceId(READER_SURFACE_BASE + self.shared.next_reader_id.fetch_add(1, Ordering::SeqCst));
        let surface = Surface {
            id,
            kind: SurfaceKind::FrameReader,
            size,
        };
        let pool: SharedPool = Arc::new(Mutex::new(FramePool::new(capacity)));
        self.shared
            .lock()
            .readers
            .insert(id, (size, Arc::clone(&pool)));
        debug!(surface = %id, %size, capacity, "Created frame reader");
        Ok(Box::new(VirtualFrameReader::new(
            surface,
            pool,
            Arc::clone(&self.shared),
        )))
    }

    fn open_device(&self, camera_id: &str, callbacks: PlatformCallbacks) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        let spec = inner
            .devices
            .get(camera_id)
            .ok_or_else(|| BackendError::DeviceNotFound(camera_id.to_string()))?;

        match spec.open_behavior.clone() {
            OpenBehavior::Refuse(err) => return Err(err),
            OpenBehavior::Fail(code) => {
                drop(inner);
                callbacks.device_error(code);
                return Ok(());
            }
            OpenBehavior::Succeed => {}
        }

        if inner.open.contains_key(camera_id) {
            drop(inner);
            debug!(camera_id, "Virtual camera already open");
            callbacks.device_error(DeviceErrorCode::InUse);
            return Ok(());
        }
        inner.open.insert(camera_id.to_string(), callbacks.clone());
        drop(inner);

        self.shared.device_opens.fetch_add(1, Ordering::SeqCst);
        info!(camera_id, "Virtual camera opened");
        callbacks.device_opened(Box::new(VirtualDevice::new(
            camera_id,
            Arc::clone(&self.shared),
            callbacks.clone(),
        )));
        Ok(())
    }
}

/// Planar 4:2:0 image with neutral chroma
fn yuv_from_luma(luma: &[u8], width: u32, height: u32) -> CapturedImage {
    let chroma_len = (width.div_ceil(2) * height.div_ceil(2)) as usize;
    let chroma: Arc<[u8]> = Arc::from(vec![128u8; chroma_len].as_slice());
    CapturedImage {
        width,
        height,
        format: PixelFormat::Yuv420,
        planes: vec![
            FramePlane {
                data: Arc::from(luma),
                row_stride: width as usize,
            },
            FramePlane {
                data: Arc::clone(&chroma),
                row_stride: width.div_ceil(2) as usize,
            },
            FramePlane {
                data: chroma,
                row_stride: width.div_ceil(2) as usize,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::PlatformEvent;
    use std::sync::mpsc;

    fn recorder() -> (PlatformCallbacks, mpsc::Receiver<PlatformEvent>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callbacks = PlatformCallbacks::new(move |event| {
            let _ = tx.lock().unwrap().send(event);
        });
        (callbacks, rx)
    }

    #[test]
    fn enumerates_devices_in_id_order() {
        let camera = VirtualCamera::default();
        let cameras = camera.enumerate_cameras().unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].name, "0");
        assert_eq!(cameras[0].lens_facing, Some(LensFacing::Back));
        assert_eq!(cameras[1].sensor_orientation, 270);
    }

    #[test]
    fn open_posts_device_opened() {
        let camera = VirtualCamera::default();
        let (callbacks, rx) = recorder();
        camera.open_device("0", callbacks).unwrap();
        // Dropping the device closes it, so keep the event alive
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, PlatformEvent::DeviceOpened(_)));
        assert!(camera.is_open("0"));
        assert_eq!(camera.device_opens(), 1);

        drop(event);
        assert!(!camera.is_open("0"));
        assert_eq!(camera.device_closes(), 1);
    }

    #[test]
    fn unknown_camera_is_refused() {
        let camera = VirtualCamera::default();
        let (callbacks, _rx) = recorder();
        let err = camera.open_device("7", callbacks).unwrap_err();
        assert_eq!(err, BackendError::DeviceNotFound("7".into()));
    }

    #[test]
    fn second_open_reports_in_use() {
        let camera = VirtualCamera::default();
        let (first, _keep) = recorder();
        camera.open_device("0", first).unwrap();
        let (second, rx) = recorder();
        camera.open_device("0", second).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            PlatformEvent::DeviceError(DeviceErrorCode::InUse)
        ));
    }

    #[test]
    fn configured_behaviors_apply() {
        let camera = VirtualCamera::new(vec![
            VirtualDeviceSpec::new("0", LensFacing::Back)
                .with_open_behavior(OpenBehavior::Refuse(BackendError::Disabled)),
            VirtualDeviceSpec::new("1", LensFacing::Front)
                .with_open_behavior(OpenBehavior::Fail(DeviceErrorCode::FatalService)),
        ]);
        let (callbacks, rx) = recorder();
        assert_eq!(
            camera.open_device("0", callbacks.clone()).unwrap_err(),
            BackendError::Disabled
        );
        camera.open_device("1", callbacks).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            PlatformEvent::DeviceError(DeviceErrorCode::FatalService)
        ));
        assert_eq!(camera.device_opens(), 0);
    }

    #[test]
    fn reader_surfaces_do_not_collide_with_textures() {
        let camera = VirtualCamera::default();
        let reader = camera.create_frame_reader(FrameSize::new(320, 240), 2).unwrap();
        assert!(reader.surface().id.0 >= READER_SURFACE_BASE);
        assert_eq!(reader.surface().kind, SurfaceKind::FrameReader);
        assert_eq!(camera.open_readers(), 1);
        drop(reader);
        assert_eq!(camera.open_readers(), 0);
    }

    #[test]
    fn profiles_come_from_device_spec() {
        let camera = VirtualCamera::new(vec![
            VirtualDeviceSpec::new("0", LensFacing::Back)
                .with_profiles([(ProfileQuality::Low, FrameSize::new(176, 144))]),
        ]);
        assert_eq!(
            camera.profile("0", ProfileQuality::Low),
            Some(FrameSize::new(176, 144))
        );
        assert_eq!(camera.profile("0", ProfileQuality::P720), None);
        assert_eq!(camera.profile("9", ProfileQuality::Low), None);
    }

    #[test]
    fn chroma_planes_are_neutral() {
        let image = yuv_from_luma(&[0u8; 9], 3, 3);
        assert_eq!(image.planes.len(), 3);
        assert_eq!(image.planes[1].data.len(), 4);
        assert!(image.planes[2].data.iter().all(|&v| v == 128));
    }
}
