//! The frame loop.
//!
//! [`FrameScheduler`] drives one frame per [`draw_frame`](FrameScheduler::draw_frame)
//! call through a fixed sequence:
//!
//! ```text
//! 1. wait for the slot's in-flight fence
//! 2. acquire a swapchain image        (out of date: recreate, skip the frame)
//! 3. update the slot's transient state
//! 4. reset the slot's fence
//! 5. record the slot's command buffer
//! 6. submit (wait image-available, signal render-finished and the fence)
//! 7. present                          (stale, resized or pending: recreate)
//! 8. advance to the next slot
//! ```
//!
//! Up to `frames_in_flight` submissions may be pending at once. A fence is
//! only reset right before the submission that signals it, so an abandoned
//! iteration never leaves a slot waiting on a fence nobody will signal.

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use vkframe_core::FrameTimer;
use vkframe_platform::SurfaceEvents;
use vkframe_rhi::swapchain::AcquireOutcome;
use vkframe_rhi::{RhiError, RhiResult};

use crate::backend::{Backend, TargetInfo};
use crate::command_recorder::CommandRecorder;
use crate::frame::{FrameCursor, FrameInfo};
use crate::hooks::FrameHooks;
use crate::swapchain_controller::{RecreateOutcome, SwapchainController};
use crate::sync_objects::{FrameSync, SyncObjectSet};

/// Where the scheduler is in the frame sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames.
    Idle,
    WaitFence,
    Acquire,
    Record,
    Submit,
    Present,
    /// The swapchain is stale and about to be rebuilt.
    NeedsRecreate,
    Recreate,
    ShuttingDown,
}

/// What a call to [`FrameScheduler::draw_frame`] produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented.
    Presented {
        slot: usize,
        image_index: u32,
        /// The swapchain was rebuilt after presenting.
        recreated: bool,
    },
    /// Acquire found the swapchain out of date. It was rebuilt and nothing
    /// was submitted; the same slot is used by the next call.
    Skipped,
    /// The surface closed while the scheduler waited for it to become
    /// drawable again.
    SurfaceClosed,
}

/// Running counters of the frame loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub recreations: u64,
}

/// Owns the per-slot resources and runs the frame loop.
pub struct FrameScheduler<B: Backend> {
    // Field order is drop order: everything created from the backend goes
    // before the backend itself.
    command_buffers: Vec<B::CommandBuffer>,
    sync: SyncObjectSet<B>,
    swapchain: SwapchainController<B>,
    backend: Arc<B>,
    cursor: FrameCursor,
    state: FrameState,
    recreate_pending: bool,
    frame_number: u64,
    stats: FrameStats,
    timer: FrameTimer,
    shut_down: bool,
}

impl<B: Backend> FrameScheduler<B> {
    /// Creates the per-slot command buffers and synchronization objects.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidArgument`] if `frames_in_flight` is zero,
    /// or the backend's error if a resource cannot be created.
    pub fn new(
        backend: Arc<B>,
        swapchain: SwapchainController<B>,
        frames_in_flight: usize,
    ) -> RhiResult<Self> {
        let sync = SyncObjectSet::create(backend.as_ref(), frames_in_flight)?;
        let command_buffers = (0..frames_in_flight)
            .map(|_| backend.allocate_command_buffer())
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame scheduler created with {} frame(s) in flight",
            frames_in_flight
        );

        Ok(Self {
            command_buffers,
            sync,
            swapchain,
            backend,
            cursor: FrameCursor::new(frames_in_flight),
            state: FrameState::Idle,
            recreate_pending: false,
            frame_number: 0,
            stats: FrameStats::default(),
            timer: FrameTimer::new(),
            shut_down: false,
        })
    }

    /// Runs one iteration of the frame loop.
    ///
    /// # Errors
    ///
    /// Any backend or hook error is fatal for the loop; the scheduler should
    /// then be shut down.
    pub fn draw_frame<S, H>(&mut self, surface: &S, hooks: &mut H) -> RhiResult<FrameOutcome>
    where
        S: SurfaceEvents + ?Sized,
        H: FrameHooks<B> + ?Sized,
    {
        if self.shut_down {
            return Err(RhiError::InvalidHandle(
                "frame scheduler has been shut down".to_string(),
            ));
        }

        let slot = self.cursor.slot();

        // 1. Wait until the previous submission from this slot has finished.
        transition(&mut self.state, FrameState::WaitFence);
        let frame = slot_sync(&self.sync, slot)?;
        self.backend.wait_for_fence(&frame.in_flight)?;

        // 2. Acquire.
        transition(&mut self.state, FrameState::Acquire);
        let image_index = match self.swapchain.acquire_next_image(&frame.image_available)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired image {} from a suboptimal swapchain", image_index);
                    self.recreate_pending = true;
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date on acquire, skipping frame");
                self.stats.frames_skipped += 1;
                transition(&mut self.state, FrameState::NeedsRecreate);
                return match self.recreate_swapchain(surface, hooks)? {
                    RecreateOutcome::Rebuilt { .. } => Ok(FrameOutcome::Skipped),
                    RecreateOutcome::SurfaceClosed => Ok(FrameOutcome::SurfaceClosed),
                };
            }
        };

        let targets = self.swapchain.targets()?;
        let info = FrameInfo {
            slot,
            image_index,
            extent: targets.extent(),
            frame_number: self.frame_number,
        };

        // 3. Per-slot transient state; the slot's fence has been waited on.
        transition(&mut self.state, FrameState::Record);
        hooks.update_frame(&info)?;

        // 4. Reset only now that a submission is certain to follow.
        let frame = slot_sync(&self.sync, slot)?;
        self.backend.reset_fence(&frame.in_flight)?;

        // 5. Record.
        let cmd = self.command_buffers.get(slot).ok_or_else(|| {
            RhiError::InvalidArgument(format!("no command buffer for frame slot {}", slot))
        })?;
        CommandRecorder::record(self.backend.as_ref(), cmd, targets, &info, hooks)?;

        // 6. Submit.
        transition(&mut self.state, FrameState::Submit);
        self.backend.submit(
            cmd,
            &frame.image_available,
            &frame.render_finished,
            &frame.in_flight,
        )?;

        // 7. Present.
        transition(&mut self.state, FrameState::Present);
        let status = self.swapchain.present(image_index, &frame.render_finished)?;
        let resized = surface.take_resized();
        self.stats.frames_presented += 1;
        self.frame_number += 1;

        let mut recreated = false;
        let mut closed = false;
        if status.needs_recreate() || resized || self.recreate_pending {
            debug!(
                "Recreating after present (status {:?}, resized {}, pending {})",
                status, resized, self.recreate_pending
            );
            transition(&mut self.state, FrameState::NeedsRecreate);
            match self.recreate_swapchain(surface, hooks)? {
                RecreateOutcome::Rebuilt { .. } => recreated = true,
                RecreateOutcome::SurfaceClosed => closed = true,
            }
        }

        // 8. Advance.
        self.cursor.advance();
        transition(&mut self.state, FrameState::Idle);

        if let Some(fps) = self.timer.tick() {
            debug!(
                "{:.1} fps ({} presented, {} skipped, {} recreation(s))",
                fps,
                self.stats.frames_presented,
                self.stats.frames_skipped,
                self.stats.recreations
            );
        }

        if closed {
            return Ok(FrameOutcome::SurfaceClosed);
        }
        Ok(FrameOutcome::Presented {
            slot,
            image_index,
            recreated,
        })
    }

    /// Rebuilds the swapchain and everything sized from it.
    ///
    /// Synchronization objects and command buffers are kept. On success the
    /// hooks are told the new extent.
    pub fn recreate_swapchain<S, H>(
        &mut self,
        surface: &S,
        hooks: &mut H,
    ) -> RhiResult<RecreateOutcome>
    where
        S: SurfaceEvents + ?Sized,
        H: FrameHooks<B> + ?Sized,
    {
        transition(&mut self.state, FrameState::Recreate);
        let outcome = self.swapchain.recreate(surface)?;

        if let RecreateOutcome::Rebuilt { extent, .. } = outcome {
            self.recreate_pending = false;
            self.stats.recreations += 1;
            hooks.on_resize(extent);
        }

        transition(&mut self.state, FrameState::Idle);
        Ok(outcome)
    }

    /// Waits for the device to go idle and releases every resource.
    ///
    /// # Errors
    ///
    /// Returns the error of the idle wait. Resources are released either way.
    pub fn shutdown(mut self) -> RhiResult<FrameStats> {
        transition(&mut self.state, FrameState::ShuttingDown);
        self.shut_down = true;
        let result = self.backend.wait_idle();
        let stats = self.stats;

        info!(
            "Frame scheduler shut down: {} presented, {} skipped, {} recreation(s)",
            stats.frames_presented, stats.frames_skipped, stats.recreations
        );

        // Drop skips the second idle wait.
        drop(self);
        result.map(|()| stats)
    }

    /// Current position in the frame sequence.
    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Slot the next [`draw_frame`](Self::draw_frame) will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.cursor.slot()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.cursor.frames_in_flight()
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    #[inline]
    pub fn sync_objects(&self) -> &SyncObjectSet<B> {
        &self.sync
    }

    #[inline]
    pub fn swapchain(&self) -> &SwapchainController<B> {
        &self.swapchain
    }

    #[inline]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: Backend> Drop for FrameScheduler<B> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        warn!("Frame scheduler dropped without shutdown, waiting for device idle");
        if let Err(e) = self.backend.wait_idle() {
            error!("Failed to wait for device idle during drop: {}", e);
        }
    }
}

fn transition(state: &mut FrameState, next: FrameState) {
    if *state != next {
        trace!("Frame state {:?} -> {:?}", state, next);
        *state = next;
    }
}

fn slot_sync<B: Backend>(sync: &SyncObjectSet<B>, slot: usize) -> RhiResult<&FrameSync<B>> {
    sync.frame(slot).ok_or_else(|| {
        RhiError::InvalidArgument(format!("no synchronization objects for frame slot {}", slot))
    })
}
