//! Swapchain-bound render targets.
//!
//! One generation holds the swapchain, a depth buffer of the same extent and
//! one framebuffer per swapchain image. Generations are built and released
//! as a unit.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkframe_rhi::RhiResult;
use vkframe_rhi::device::Device;
use vkframe_rhi::framebuffer::Framebuffer;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::render_pass::RenderPass;
use vkframe_rhi::swapchain::Swapchain;

use crate::backend::TargetInfo;
use crate::depth_buffer::DepthBuffer;

/// A complete generation of render targets.
///
/// # Resource Destruction Order
///
/// Fields drop in declaration order: framebuffers first, then the depth
/// buffer they reference, then the swapchain whose image views they use.
pub struct RenderTargets {
    framebuffers: Vec<Framebuffer>,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
}

impl RenderTargets {
    /// Builds a generation of render targets for `extent`.
    ///
    /// When `retired` is given, its framebuffers and depth buffer are
    /// released before anything new is created, its swapchain is passed as
    /// the old swapchain and then released whether or not creation
    /// succeeded. The device must be idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the swapchain, depth buffer or any framebuffer
    /// cannot be created. Nothing of the new generation is leaked.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        render_pass: &RenderPass,
        extent: vk::Extent2D,
        present_mode: vk::PresentModeKHR,
        retired: Option<RenderTargets>,
    ) -> RhiResult<Self> {
        let old_swapchain = retired.map(|targets| {
            let RenderTargets {
                framebuffers,
                depth_buffer,
                swapchain,
            } = targets;
            drop(framebuffers);
            drop(depth_buffer);
            swapchain
        });

        let old_handle = old_swapchain
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), Swapchain::handle);
        let swapchain = Swapchain::new(
            instance,
            device.clone(),
            surface,
            extent,
            present_mode,
            old_handle,
        );
        // The retired swapchain is released even if the new one failed.
        if let Some(old) = old_swapchain {
            debug!("Releasing retired swapchain");
            drop(old);
        }
        let swapchain = swapchain?;

        let extent = swapchain.extent();
        let depth_buffer = DepthBuffer::new(device.clone(), extent, render_pass.depth_format())?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass.handle(),
                    &[view, depth_buffer.image_view()],
                    extent,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Render targets ready: {}x{}, {} framebuffer(s), {:?}",
            extent.width,
            extent.height,
            framebuffers.len(),
            swapchain.present_mode()
        );

        Ok(Self {
            framebuffers,
            depth_buffer,
            swapchain,
        })
    }

    /// Framebuffer for swapchain image `image_index`.
    #[inline]
    pub fn framebuffer(&self, image_index: u32) -> Option<&Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }
}

impl TargetInfo for RenderTargets {
    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }
}
