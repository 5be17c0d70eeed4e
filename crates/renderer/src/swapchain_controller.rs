//! Ownership and recreation of the swapchain-bound render targets.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkframe_platform::SurfaceEvents;
use vkframe_rhi::swapchain::{AcquireOutcome, SwapchainStatus};
use vkframe_rhi::{RhiError, RhiResult};

use crate::backend::{Backend, TargetInfo};

/// Result of a recreation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// A new generation of render targets is in place.
    Rebuilt {
        extent: vk::Extent2D,
        image_count: u32,
    },
    /// The surface closed while waiting for a drawable size; nothing was
    /// rebuilt.
    SurfaceClosed,
}

/// Holds the current generation of render targets and rebuilds it on demand.
///
/// A generation is always complete: the targets are replaced as a whole and
/// never partially rebuilt.
pub struct SwapchainController<B: Backend> {
    targets: Option<B::Targets>,
    generation: u64,
    backend: Arc<B>,
}

impl<B: Backend> SwapchainController<B> {
    /// Waits for the surface to have a drawable size and builds the first
    /// generation of render targets.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if the surface closes before it
    /// ever becomes drawable, or the backend's error if creation fails.
    pub fn new<S: SurfaceEvents + ?Sized>(backend: Arc<B>, surface: &S) -> RhiResult<Self> {
        let extent = wait_for_drawable_extent(backend.as_ref(), surface)?.ok_or_else(|| {
            RhiError::SurfaceError("surface closed before it became drawable".to_string())
        })?;

        let targets = backend.create_targets(extent, None)?;
        info!(
            "Render targets created: {}x{}, {} image(s)",
            targets.extent().width,
            targets.extent().height,
            targets.image_count()
        );

        Ok(Self {
            targets: Some(targets),
            generation: 1,
            backend,
        })
    }

    /// Current render targets.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if the last recreation failed
    /// and left no targets behind.
    pub fn targets(&self) -> RhiResult<&B::Targets> {
        self.targets
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("no render targets".to_string()))
    }

    /// Acquires the next image of the current swapchain.
    pub fn acquire_next_image(&self, signal: &B::Semaphore) -> RhiResult<AcquireOutcome> {
        self.backend.acquire_next_image(self.targets()?, signal)
    }

    /// Presents `image_index` of the current swapchain.
    pub fn present(&self, image_index: u32, wait: &B::Semaphore) -> RhiResult<SwapchainStatus> {
        self.backend.present(self.targets()?, image_index, wait)
    }

    /// Rebuilds the render targets for the surface's current size.
    ///
    /// Clears the surface's resize flag, blocks while either the window or
    /// the surface itself is zero-sized (a minimized window), waits for the
    /// device to go idle, then replaces the whole generation. A resize
    /// reported after the flag was cleared stays pending for the next frame.
    /// Calling it with nothing stale simply builds an equivalent generation.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the surface query, waiting or creation
    /// fails. A failed creation leaves no targets behind and should be
    /// treated as fatal.
    pub fn recreate<S>(&mut self, surface: &S) -> RhiResult<RecreateOutcome>
    where
        S: SurfaceEvents + ?Sized,
    {
        surface.take_resized();
        let Some(extent) = wait_for_drawable_extent(self.backend.as_ref(), surface)? else {
            info!("Surface closed while waiting to recreate the swapchain");
            return Ok(RecreateOutcome::SurfaceClosed);
        };

        self.backend.wait_idle()?;

        let retired = self.targets.take();
        let targets = self.backend.create_targets(extent, retired)?;
        let outcome = RecreateOutcome::Rebuilt {
            extent: targets.extent(),
            image_count: targets.image_count(),
        };
        self.targets = Some(targets);
        self.generation += 1;

        info!(
            "Swapchain recreated (generation {}): {:?}",
            self.generation, outcome
        );
        Ok(outcome)
    }

    /// Number of generations built so far, starting at 1.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Extent of the current targets, if any.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.targets.as_ref().map(TargetInfo::extent)
    }

    /// Image count of the current targets, if any.
    pub fn image_count(&self) -> Option<u32> {
        self.targets.as_ref().map(TargetInfo::image_count)
    }
}

/// Blocks until both the window's framebuffer and the backend's surface
/// have a non-zero size.
///
/// Returns `None` if the surface closes first.
fn wait_for_drawable_extent<B, S>(backend: &B, surface: &S) -> RhiResult<Option<vk::Extent2D>>
where
    B: Backend,
    S: SurfaceEvents + ?Sized,
{
    loop {
        let (width, height) = surface.framebuffer_size();
        if width > 0 && height > 0 {
            if let Some(extent) = backend.drawable_extent(vk::Extent2D { width, height })? {
                return Ok(Some(extent));
            }
            debug!(
                "Window is {}x{} but the surface has no drawable area, waiting",
                width, height
            );
        } else {
            debug!("Framebuffer is {}x{}, waiting for the surface", width, height);
        }
        if !surface.wait_events() {
            return Ok(None);
        }
    }
}
