//! Main renderer orchestration.
//!
//! [`Renderer`] wires the Vulkan backend, the swapchain controller and the
//! frame scheduler to one window, and is what the render thread drives.

use std::sync::Arc;

use tracing::info;

use vkframe_core::FrameConfig;
use vkframe_platform::{SurfaceState, Window};
use vkframe_rhi::RhiResult;

use crate::frame_scheduler::{FrameOutcome, FrameScheduler, FrameStats};
use crate::hooks::FrameHooks;
use crate::swapchain_controller::SwapchainController;
use crate::vulkan_backend::VulkanBackend;

/// Renders frames to one window.
///
/// # Resource Destruction Order
///
/// The scheduler goes first and takes every Vulkan object with it. The
/// window handle is kept until last so the native window outlives its
/// surface.
pub struct Renderer {
    scheduler: FrameScheduler<VulkanBackend>,
    surface_state: Arc<SurfaceState>,
    _window: Window,
}

impl Renderer {
    /// Creates the Vulkan backend for `window` and builds the first
    /// swapchain generation.
    ///
    /// Blocks while the window is minimized.
    ///
    /// # Errors
    ///
    /// Returns an error if Vulkan initialization fails or the window closes
    /// before it can be drawn to.
    pub fn new(
        window: Window,
        surface_state: Arc<SurfaceState>,
        config: &FrameConfig,
    ) -> RhiResult<Self> {
        let (width, height) = window.framebuffer_size();
        info!(
            "Initializing renderer ({}x{}, {} frame(s) in flight)",
            width, height, config.frames_in_flight
        );

        let backend = Arc::new(VulkanBackend::new(&window, config)?);
        let swapchain = SwapchainController::new(backend.clone(), surface_state.as_ref())?;
        let scheduler = FrameScheduler::new(backend, swapchain, config.frames_in_flight)?;

        Ok(Self {
            scheduler,
            surface_state,
            _window: window,
        })
    }

    /// Produces one frame.
    ///
    /// # Errors
    ///
    /// Any error is fatal; call [`shutdown`](Self::shutdown) afterwards.
    pub fn render_frame<H>(&mut self, hooks: &mut H) -> RhiResult<FrameOutcome>
    where
        H: FrameHooks<VulkanBackend> + ?Sized,
    {
        self.scheduler
            .draw_frame(self.surface_state.as_ref(), hooks)
    }

    /// Waits for the GPU to finish and releases every resource.
    ///
    /// # Errors
    ///
    /// Returns the error of the final idle wait.
    pub fn shutdown(self) -> RhiResult<FrameStats> {
        let Self {
            scheduler,
            surface_state: _,
            _window,
        } = self;
        scheduler.shutdown()
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.scheduler.stats()
    }

    #[inline]
    pub fn scheduler(&self) -> &FrameScheduler<VulkanBackend> {
        &self.scheduler
    }
}
