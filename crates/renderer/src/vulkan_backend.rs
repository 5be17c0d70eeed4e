//! Vulkan implementation of [`Backend`].

use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use vkframe_core::{FrameConfig, PresentModePreference};
use vkframe_platform::{Surface, Window};
use vkframe_rhi::command::{CommandBuffer, CommandPool};
use vkframe_rhi::device::{Device, FrameSubmission};
use vkframe_rhi::instance::Instance;
use vkframe_rhi::gpu::select_gpu;
use vkframe_rhi::render_pass::{DEPTH_FORMAT, RenderPass};
use vkframe_rhi::swapchain::{
    AcquireOutcome, SurfaceSupport, SwapchainStatus, drawable_extent,
};
use vkframe_rhi::sync::{Fence, Semaphore};
use vkframe_rhi::{RhiError, RhiResult};

use crate::backend::{Backend, TargetInfo};
use crate::render_targets::RenderTargets;

const APP_NAME: &std::ffi::CStr = c"vkframe";

/// Maps the configured present mode to its Vulkan value.
pub fn present_mode_for(preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

/// Owns the Vulkan instance, device, surface and the objects shared by every
/// swapchain generation.
///
/// # Resource Destruction Order
///
/// Fields drop in declaration order:
/// 1. Command pool (frees every command buffer allocated from it)
/// 2. Render pass
/// 3. Device, once the last resource holding it is gone
/// 4. Surface
/// 5. Instance
///
/// Render targets, fences, semaphores and command buffers created from the
/// backend must be dropped before it.
pub struct VulkanBackend {
    command_pool: CommandPool,
    render_pass: RenderPass,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    present_mode: vk::PresentModeKHR,
}

impl VulkanBackend {
    /// Initializes Vulkan for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The surface extensions or the surface are unavailable
    /// - No GPU can render and present to the surface
    /// - Device, render pass or command pool creation fails
    pub fn new(window: &Window, config: &FrameConfig) -> RhiResult<Self> {
        let surface_extensions = window
            .surface_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(APP_NAME, config.validation, &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let gpu = select_gpu(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &gpu)?;

        let support =
            SurfaceSupport::query(device.physical_device(), surface.handle(), surface.loader())?;
        let color_format = support.surface_format().format;
        let render_pass = RenderPass::new_forward_pass(device.clone(), color_format, DEPTH_FORMAT)?;

        let graphics_family = device.queue_families().graphics.ok_or_else(|| {
            RhiError::InvalidArgument("device has no graphics queue family".to_string())
        })?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let present_mode = present_mode_for(config.present_mode);
        info!(
            "Vulkan backend ready on {} (color {:?}, depth {:?}, prefers {:?})",
            gpu.name(),
            color_format,
            DEPTH_FORMAT,
            present_mode
        );

        Ok(Self {
            command_pool,
            render_pass,
            device,
            surface,
            instance,
            present_mode,
        })
    }
}

impl Backend for VulkanBackend {
    type Fence = Fence;
    type Semaphore = Semaphore;
    type CommandBuffer = CommandBuffer;
    type Targets = RenderTargets;

    fn create_fence(&self, signaled: bool) -> RhiResult<Fence> {
        Fence::new(self.device.clone(), signaled)
    }

    fn create_semaphore(&self) -> RhiResult<Semaphore> {
        Semaphore::new(self.device.clone())
    }

    fn wait_for_fence(&self, fence: &Fence) -> RhiResult<()> {
        fence.wait()
    }

    fn reset_fence(&self, fence: &Fence) -> RhiResult<()> {
        fence.reset()
    }

    fn allocate_command_buffer(&self) -> RhiResult<CommandBuffer> {
        self.command_pool.allocate()
    }

    fn begin_commands(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        cmd.begin_frame()
    }

    fn begin_render_pass(
        &self,
        cmd: &CommandBuffer,
        targets: &RenderTargets,
        image_index: u32,
        clear_color: [f32; 4],
    ) -> RhiResult<()> {
        let framebuffer = targets.framebuffer(image_index).ok_or_else(|| {
            RhiError::InvalidArgument(format!("no framebuffer for image {}", image_index))
        })?;
        cmd.begin_pass(
            self.render_pass.handle(),
            framebuffer.handle(),
            targets.extent(),
            clear_color,
        );
        Ok(())
    }

    fn end_render_pass(&self, cmd: &CommandBuffer) {
        cmd.end_pass();
    }

    fn end_commands(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        cmd.end_frame()
    }

    fn submit(
        &self,
        cmd: &CommandBuffer,
        wait: &Semaphore,
        signal: &Semaphore,
        fence: &Fence,
    ) -> RhiResult<()> {
        let frame = FrameSubmission {
            command_buffer: cmd.handle(),
            image_available: wait.handle(),
            render_finished: signal.handle(),
            in_flight: fence.handle(),
        };
        // SAFETY: the scheduler keeps the slot's command buffer, semaphores
        // and fence alive until the fence is waited on, and reset the fence
        // right before recording.
        unsafe { self.device.submit_frame(&frame) }
    }

    fn drawable_extent(&self, framebuffer: vk::Extent2D) -> RhiResult<Option<vk::Extent2D>> {
        drawable_extent(
            self.device.physical_device(),
            self.surface.handle(),
            self.surface.loader(),
            framebuffer,
        )
    }

    fn create_targets(
        &self,
        extent: vk::Extent2D,
        retired: Option<RenderTargets>,
    ) -> RhiResult<RenderTargets> {
        RenderTargets::new(
            &self.instance,
            self.device.clone(),
            self.surface.handle(),
            &self.render_pass,
            extent,
            self.present_mode,
            retired,
        )
    }

    fn acquire_next_image(
        &self,
        targets: &RenderTargets,
        signal: &Semaphore,
    ) -> RhiResult<AcquireOutcome> {
        targets.swapchain().acquire_next_image(signal.handle())
    }

    fn present(
        &self,
        targets: &RenderTargets,
        image_index: u32,
        wait: &Semaphore,
    ) -> RhiResult<SwapchainStatus> {
        targets
            .swapchain()
            .present(self.device.present_queue(), image_index, wait.handle())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during backend drop: {:?}", e);
        }
        info!("Vulkan backend destroyed");
    }
}
