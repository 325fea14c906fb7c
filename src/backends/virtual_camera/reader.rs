// SPDX-License-Identifier: GPL-3.0-only

//! Bounded frame reader
//!
//! Mirrors a platform image reader: a fixed number of buffers shared between
//! frames waiting to be acquired and frames held by the consumer. When every
//! buffer is in use, newly captured frames are dropped.

use super::Shared;
use crate::backends::camera::{
    CameraFrame, FrameLease, FramePlane, FrameReader, FrameSize, PixelFormat, Surface,
};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Image content produced by one capture
#[derive(Debug, Clone)]
pub(crate) struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<FramePlane>,
}

#[derive(Debug)]
pub(crate) struct FramePool {
    capacity: usize,
    queued: VecDeque<CapturedImage>,
    held: usize,
    listening: bool,
    closed: bool,
    dropped: u64,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queued: VecDeque::with_capacity(capacity),
            held: 0,
            listening: true,
            closed: false,
            dropped: 0,
        }
    }

    /// Queue a captured image, evicting the oldest queued one when full
    pub fn push(&mut self, image: CapturedImage) {
        if self.closed || !self.listening {
            return;
        }
        if self.held >= self.capacity {
            self.dropped += 1;
            trace!("All reader buffers held, dropping frame");
            return;
        }
        self.queued.push_back(image);
        while self.queued.len() + self.held > self.capacity {
            self.queued.pop_front();
            self.dropped += 1;
        }
    }

    /// Frames dropped because no buffer was free
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub(crate) type SharedPool = Arc<Mutex<FramePool>>;

pub(crate) fn lock_pool(pool: &SharedPool) -> std::sync::MutexGuard<'_, FramePool> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame reader handed out by the virtual camera
pub struct VirtualFrameReader {
    surface: Surface,
    pool: SharedPool,
    shared: Arc<Shared>,
    closed: bool,
}

impl VirtualFrameReader {
    pub(crate) fn new(surface: Surface, pool: SharedPool, shared: Arc<Shared>) -> Self {
        Self {
            surface,
            pool,
            shared,
            closed: false,
        }
    }

    pub fn size(&self) -> FrameSize {
        self.surface.size
    }
}

impl FrameReader for VirtualFrameReader {
    fn surface(&self) -> Surface {
        self.surface
    }

    fn acquire_latest(&mut self) -> Option<CameraFrame> {
        let image = {
            let mut pool = lock_pool(&self.pool);
            if pool.closed || pool.held >= pool.capacity {
                return None;
            }
            let newest = pool.queued.pop_back()?;
            pool.queued.clear();
            pool.held += 1;
            newest
        };
        self.shared.frames_in_flight.fetch_add(1, Ordering::SeqCst);

        let pool = Arc::clone(&self.pool);
        let shared = Arc::clone(&self.shared);
        let lease = FrameLease::new(move || {
            let mut pool = lock_pool(&pool);
            pool.held = pool.held.saturating_sub(1);
            shared.frames_in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Some(CameraFrame::new(image.width, image.height, image.format, image.planes).with_lease(lease))
    }

    fn detach_listener(&mut self) {
        lock_pool(&self.pool).listening = false;
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.unregister_reader(self.surface.id);
        let mut pool = lock_pool(&self.pool);
        pool.closed = true;
        pool.queued.clear();
        debug!(surface = %self.surface.id, dropped = pool.dropped(), "Frame reader closed");
    }
}

impl Drop for VirtualFrameReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> CapturedImage {
        CapturedImage {
            width: 1,
            height: 1,
            format: PixelFormat::Gray8,
            planes: vec![FramePlane {
                data: Arc::from(vec![tag].as_slice()),
                row_stride: 1,
            }],
        }
    }

    fn tag(image: &CapturedImage) -> u8 {
        image.planes[0].data[0]
    }

    #[test]
    fn pool_keeps_newest_within_capacity() {
        let mut pool = FramePool::new(2);
        for n in 1..=4 {
            pool.push(image(n));
        }
        assert_eq!(pool.queued.len(), 2);
        assert_eq!(tag(pool.queued.back().unwrap()), 4);
        assert_eq!(pool.dropped(), 2);
    }

    #[test]
    fn pool_drops_when_every_buffer_is_held() {
        let mut pool = FramePool::new(1);
        pool.held = 1;
        pool.push(image(1));
        assert!(pool.queued.is_empty());
        assert_eq!(pool.dropped(), 1);
    }

    #[test]
    fn detached_pool_ignores_frames() {
        let mut pool = FramePool::new(2);
        pool.listening = false;
        pool.push(image(1));
        assert!(pool.queued.is_empty());
    }
}
