//! Fences and semaphores used to pace the frame loop.
//!
//! A frame slot owns one [`Fence`] that the CPU waits on before reusing the
//! slot, and two [`Semaphore`]s that order acquire, submit and present on the
//! GPU. Grouping them per slot is the renderer's job.

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::RhiResult;

/// Binary semaphore, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    raw: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let raw = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        trace!("Semaphore {:?} created", raw);
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.raw
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: the owner waits for the device to go idle before dropping
        // frame sync objects, so no queue operation still references it.
        unsafe { self.device.handle().destroy_semaphore(self.raw, None) };
        trace!("Semaphore {:?} destroyed", self.raw);
    }
}

/// Completion signal of one queue submission.
///
/// Frame-slot fences start signaled so the first wait on an unused slot
/// returns at once.
pub struct Fence {
    device: Arc<Device>,
    raw: vk::Fence,
}

impl Fence {
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let create_info = vk::FenceCreateInfo::default().flags(fence_flags(signaled));
        let raw = unsafe { device.handle().create_fence(&create_info, None)? };
        trace!("Fence {:?} created (signaled: {})", raw, signaled);
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.raw
    }

    /// Blocks until the fence is signaled, with no timeout.
    ///
    /// # Errors
    ///
    /// Returns the driver error, typically `ERROR_DEVICE_LOST`.
    pub fn wait(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.raw], true, u64::MAX)?
        };
        Ok(())
    }

    /// Returns the fence to the unsignaled state. It must not be pending.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.raw])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: see Semaphore::drop.
        unsafe { self.device.handle().destroy_fence(self.raw, None) };
        trace!("Fence {:?} destroyed", self.raw);
    }
}

fn fence_flags(signaled: bool) -> vk::FenceCreateFlags {
    if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    }
}
