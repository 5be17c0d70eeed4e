//! Per-slot synchronization objects.
//!
//! Each frame slot owns an image-available semaphore, a render-finished
//! semaphore and an in-flight fence. The set is sized by the number of
//! frames in flight and lives as long as the scheduler; swapchain
//! recreation leaves it untouched.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on in_flight_fence (CPU waits for previous use of this slot)
//! 2. Acquire swapchain image (signals image_available)
//! 3. Reset in_flight_fence, record the slot's command buffer
//! 4. Submit:
//!    - Wait on image_available
//!    - Signal render_finished
//!    - Signal in_flight_fence
//! 5. Present (waits on render_finished)
//! ```

use tracing::{debug, info};

use vkframe_rhi::{RhiError, RhiResult};

use crate::backend::Backend;

/// Synchronization objects of one frame slot.
pub struct FrameSync<B: Backend> {
    /// Signaled by acquire when the swapchain image is ready.
    pub image_available: B::Semaphore,
    /// Signaled by the submission when rendering is complete.
    pub render_finished: B::Semaphore,
    /// Signaled when the slot's submission finishes on the GPU. Created
    /// signaled so the first wait returns immediately.
    pub in_flight: B::Fence,
}

/// The synchronization objects of every frame slot.
pub struct SyncObjectSet<B: Backend> {
    frames: Vec<FrameSync<B>>,
}

impl<B: Backend> SyncObjectSet<B> {
    /// Creates `frames_in_flight` sets of synchronization objects.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidArgument`] if `frames_in_flight` is zero,
    /// or the backend's error if any object cannot be created. Objects
    /// created before a failure are released.
    pub fn create(backend: &B, frames_in_flight: usize) -> RhiResult<Self> {
        if frames_in_flight == 0 {
            return Err(RhiError::InvalidArgument(
                "at least one frame in flight is required".to_string(),
            ));
        }

        let frames = (0..frames_in_flight)
            .map(|slot| {
                let frame = FrameSync {
                    image_available: backend.create_semaphore()?,
                    render_finished: backend.create_semaphore()?,
                    in_flight: backend.create_fence(true)?,
                };
                debug!("Created synchronization objects for frame slot {}", slot);
                Ok(frame)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Created synchronization objects for {} frame(s) in flight",
            frames.len()
        );

        Ok(Self { frames })
    }

    /// Returns the objects of `slot`, if it exists.
    #[inline]
    pub fn frame(&self, slot: usize) -> Option<&FrameSync<B>> {
        self.frames.get(slot)
    }

    /// Number of frame slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; an empty set cannot be created.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterates over the slots in order.
    pub fn iter(&self) -> impl Iterator<Item = &FrameSync<B>> {
        self.frames.iter()
    }

    /// Releases every object.
    ///
    /// The caller must ensure no submission that uses them is still pending,
    /// typically by waiting for the device to go idle first.
    pub fn destroy(self) {
        let count = self.frames.len();
        drop(self.frames);
        debug!("Destroyed synchronization objects for {} frame slot(s)", count);
    }
}
