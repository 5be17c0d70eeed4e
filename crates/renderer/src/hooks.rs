//! Application hooks called by the frame loop.

use ash::vk;

use vkframe_rhi::RhiResult;

use crate::backend::Backend;
use crate::frame::FrameInfo;

/// Everything a hook may touch while the render pass is open.
pub struct RecordContext<'a, B: Backend> {
    backend: &'a B,
    command_buffer: &'a B::CommandBuffer,
    targets: &'a B::Targets,
    frame: &'a FrameInfo,
}

impl<'a, B: Backend> RecordContext<'a, B> {
    pub(crate) fn new(
        backend: &'a B,
        command_buffer: &'a B::CommandBuffer,
        targets: &'a B::Targets,
        frame: &'a FrameInfo,
    ) -> Self {
        Self {
            backend,
            command_buffer,
            targets,
            frame,
        }
    }

    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// The command buffer being recorded, inside the begun render pass.
    pub fn command_buffer(&self) -> &'a B::CommandBuffer {
        self.command_buffer
    }

    pub fn targets(&self) -> &'a B::Targets {
        self.targets
    }

    pub fn frame(&self) -> &'a FrameInfo {
        self.frame
    }
}

/// Per-application behavior plugged into the frame loop.
///
/// Only [`clear_color`](FrameHooks::clear_color) is required; the rest
/// default to doing nothing.
pub trait FrameHooks<B: Backend> {
    /// Updates the transient state of `frame.slot` (uniform data and the
    /// like). Called after the slot's fence has been waited on, so nothing
    /// the GPU is still reading belongs to this slot.
    fn update_frame(&mut self, frame: &FrameInfo) -> RhiResult<()> {
        let _ = frame;
        Ok(())
    }

    /// Color the render pass clears to.
    fn clear_color(&self, frame: &FrameInfo) -> [f32; 4];

    /// Records the scene into the open render pass.
    fn record(&mut self, ctx: &RecordContext<'_, B>) -> RhiResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Records an overlay on top of the scene, still inside the render pass.
    fn overlay(&mut self, ctx: &RecordContext<'_, B>) -> RhiResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called after every successful swapchain recreation.
    fn on_resize(&mut self, extent: vk::Extent2D) {
        let _ = extent;
    }
}

/// Hooks that only clear to a fixed color.
#[derive(Clone, Copy, Debug)]
pub struct ClearHooks {
    pub color: [f32; 4],
}

impl ClearHooks {
    pub fn new(color: [f32; 4]) -> Self {
        Self { color }
    }
}

impl<B: Backend> FrameHooks<B> for ClearHooks {
    fn clear_color(&self, _frame: &FrameInfo) -> [f32; 4] {
        self.color
    }
}
