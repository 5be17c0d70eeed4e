//! Per-frame command recording.
//!
//! Each frame slot re-records one primary [`CommandBuffer`] every frame: reset,
//! begin, one pass over the whole swapchain image, end. Buffers come from a
//! single [`CommandPool`] on the graphics family that allows individual reset.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Pool the frame slots' command buffers are allocated from.
///
/// Dropping the pool frees every buffer allocated from it, so all
/// [`CommandBuffer`]s must be dropped first.
pub struct CommandPool {
    device: Arc<Device>,
    raw: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let raw = unsafe { device.handle().create_command_pool(&create_info, None)? };
        info!("Command pool created on queue family {}", queue_family_index);

        Ok(Self {
            device,
            raw,
            queue_family_index,
        })
    }

    /// Allocates one primary command buffer.
    pub fn allocate(&self) -> RhiResult<CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.raw)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let raw = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? }
            .into_iter()
            .next()
            .ok_or_else(|| {
                RhiError::InvalidHandle("driver returned no command buffer".to_string())
            })?;
        debug!("Command buffer {:?} allocated", raw);

        Ok(CommandBuffer {
            device: self.device.clone(),
            raw,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_command_pool(self.raw, None) };
        info!(
            "Command pool on queue family {} destroyed",
            self.queue_family_index
        );
    }
}

/// A frame slot's primary command buffer. The handle is owned by its pool.
pub struct CommandBuffer {
    device: Arc<Device>,
    raw: vk::CommandBuffer,
}

impl CommandBuffer {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.raw
    }

    /// Resets the buffer and begins a one-time-submit recording.
    ///
    /// The previous submission of this buffer must have completed.
    pub fn begin_frame(&self) -> RhiResult<()> {
        let device = self.device.handle();
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device.reset_command_buffer(self.raw, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(self.raw, &begin_info)?;
        }
        Ok(())
    }

    pub fn end_frame(&self) -> RhiResult<()> {
        unsafe { self.device.handle().end_command_buffer(self.raw)? };
        Ok(())
    }

    /// Begins `render_pass` on `framebuffer`, clearing color to
    /// `clear_color` and depth to 1.0, and points viewport and scissor at
    /// the whole `extent`.
    pub fn begin_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let area = full_area(extent);
        let clear_values = clear_values(clear_color);
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(area)
            .clear_values(&clear_values);
        let viewport = full_viewport(extent);

        let device = self.device.handle();
        unsafe {
            device.cmd_begin_render_pass(self.raw, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(self.raw, 0, &[viewport]);
            device.cmd_set_scissor(self.raw, 0, &[area]);
        }
    }

    pub fn end_pass(&self) {
        unsafe { self.device.handle().cmd_end_render_pass(self.raw) };
    }

    /// Clears regions of the current pass's attachments. Only valid between
    /// [`begin_pass`](Self::begin_pass) and [`end_pass`](Self::end_pass).
    pub fn clear_attachments(&self, attachments: &[vk::ClearAttachment], rects: &[vk::ClearRect]) {
        unsafe {
            self.device
                .handle()
                .cmd_clear_attachments(self.raw, attachments, rects)
        };
    }
}

fn full_area(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Clear values in attachment order: color, then depth/stencil.
fn clear_values(clear_color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}
