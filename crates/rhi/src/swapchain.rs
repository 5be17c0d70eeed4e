//! Swapchain creation, acquire and present.
//!
//! A swapchain is never resized in place: recreation builds a new
//! [`Swapchain`] with the previous handle as `old_swapchain` and then drops
//! the previous value. Staleness reported by acquire and present is folded
//! into [`AcquireOutcome`] and [`SwapchainStatus`]; only real failures travel
//! as [`RhiError`].

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Health of the swapchain as reported by a present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainStatus {
    /// The swapchain matches the surface exactly.
    Optimal,
    /// Still usable, but no longer an exact match for the surface.
    Suboptimal,
    /// Incompatible with the surface; must be recreated before further use.
    OutOfDate,
}

impl SwapchainStatus {
    #[inline]
    pub fn needs_recreate(self) -> bool {
        self != SwapchainStatus::Optimal
    }
}

/// Result of asking the swapchain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; the semaphore passed to the acquire will be
    /// signaled once it is ready.
    Acquired { image_index: u32, suboptimal: bool },
    /// Nothing was acquired and the semaphore was not touched.
    OutOfDate,
}

/// Maps the raw result of `vkAcquireNextImageKHR`.
///
/// Anything other than success, suboptimal or out-of-date is fatal.
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(RhiError::from(e)),
    }
}

/// Maps the raw result of `vkQueuePresentKHR`.
///
/// Anything other than success, suboptimal or out-of-date is fatal.
pub fn classify_present(result: Result<bool, vk::Result>) -> RhiResult<SwapchainStatus> {
    match result {
        Ok(false) => Ok(SwapchainStatus::Optimal),
        Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(SwapchainStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainStatus::OutOfDate),
        Err(e) => Err(RhiError::from(e)),
    }
}

/// What a surface offers a swapchain on a given GPU, and the choices the
/// frame loop makes from it.
#[derive(Clone, Debug)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let support = unsafe {
            Self {
                capabilities: loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: loader.get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            }
        };
        debug!(
            "Surface offers {} format(s), {} present mode(s), {}..{} images",
            support.formats.len(),
            support.present_modes.len(),
            support.capabilities.min_image_count,
            support.capabilities.max_image_count
        );
        Ok(support)
    }

    /// At least one format and one present mode.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// B8G8R8A8_SRGB if offered, then B8G8R8A8_UNORM, then whatever comes
    /// first.
    ///
    /// Deterministic for a given surface, so the render pass built from it
    /// stays compatible with every later swapchain.
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        let offered = |format: vk::Format| {
            self.formats.iter().copied().find(|f| {
                f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        };

        if let Some(format) = offered(vk::Format::B8G8R8A8_SRGB) {
            return format;
        }
        if let Some(format) = offered(vk::Format::B8G8R8A8_UNORM) {
            warn!("B8G8R8A8_SRGB not offered, using B8G8R8A8_UNORM");
            return format;
        }
        let first = self.formats.first().copied().unwrap_or(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        });
        warn!("No sRGB BGRA format offered, using {:?}", first.format);
        first
    }

    /// `preferred` if offered, otherwise FIFO, which every surface supports.
    pub fn present_mode(&self, preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if self.present_modes.contains(&preferred) {
            preferred
        } else {
            warn!("{:?} not offered, presenting with FIFO", preferred);
            vk::PresentModeKHR::FIFO
        }
    }

    /// Swapchain extent for a window of `requested` size, or `None` while the
    /// surface has no drawable area.
    pub fn extent(&self, requested: vk::Extent2D) -> Option<vk::Extent2D> {
        fit_extent(&self.capabilities, requested)
    }

    /// One image above the minimum, within the maximum when there is one.
    pub fn image_count(&self) -> u32 {
        let caps = &self.capabilities;
        let wanted = caps.min_image_count + 1;
        if caps.max_image_count == 0 {
            wanted
        } else {
            wanted.min(caps.max_image_count)
        }
    }

    /// OPAQUE when supported, otherwise the first supported mode.
    pub fn composite_alpha(&self) -> vk::CompositeAlphaFlagsKHR {
        let supported = self.capabilities.supported_composite_alpha;
        [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::INHERIT,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        ]
        .into_iter()
        .find(|mode| supported.contains(*mode))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
    }
}

/// Extent a swapchain for `surface` would get right now for a window of
/// `requested` size, or `None` while the surface has no drawable area.
///
/// A minimized window can report a zero `current_extent` before the window
/// system delivers the matching resize event.
pub fn drawable_extent(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    loader: &ash::khr::surface::Instance,
    requested: vk::Extent2D,
) -> RhiResult<Option<vk::Extent2D>> {
    let capabilities =
        unsafe { loader.get_physical_device_surface_capabilities(physical_device, surface)? };
    Ok(fit_extent(&capabilities, requested))
}

/// The surface's current extent when it dictates one, otherwise `requested`
/// clamped to the surface limits. Zero-sized results are `None`.
fn fit_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> Option<vk::Extent2D> {
    let extent = if capabilities.current_extent.width == u32::MAX {
        let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
        vk::Extent2D {
            width: requested.width.clamp(min.width, max.width),
            height: requested.height.clamp(min.height, max.height),
        }
    } else {
        capabilities.current_extent
    };
    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// Swapchain plus one color view per image.
///
/// Dropping destroys the views, then the swapchain and with it the images.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    raw: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Builds a swapchain for a window of `requested` size.
    ///
    /// `old_swapchain` is the handle being replaced, or null. The caller
    /// keeps ownership of it and drops it after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the surface support is
    /// inadequate or has no drawable area, and the driver error if creating
    /// the swapchain or its views fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        requested: vk::Extent2D,
        preferred_present_mode: vk::PresentModeKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let support = SurfaceSupport::query(device.physical_device(), surface, &surface_loader)?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "surface offers no format or present mode".to_string(),
            ));
        }

        let extent = support.extent(requested).ok_or_else(|| {
            RhiError::SwapchainError("surface has no drawable area".to_string())
        })?;
        let surface_format = support.surface_format();
        let present_mode = support.present_mode(preferred_present_mode);

        let Some((graphics, present)) = device.queue_families().resolved() else {
            return Err(RhiError::SwapchainError(
                "device has no graphics/present queue family".to_string(),
            ));
        };
        let shared_families = [graphics, present];
        let (sharing_mode, family_indices) = if graphics == present {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        } else {
            (vk::SharingMode::CONCURRENT, &shared_families[..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(support.image_count())
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(support.composite_alpha())
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let raw = unsafe { loader.create_swapchain(&create_info, None)? };

        // From here on an early return must not leak `raw` or its views.
        let mut swapchain = Self {
            device,
            loader,
            raw,
            image_views: Vec::new(),
            extent,
            present_mode,
        };
        let images = unsafe { swapchain.loader.get_swapchain_images(raw)? };
        for image in images {
            let view = color_view(&swapchain.device, image, surface_format.format)?;
            swapchain.image_views.push(view);
        }

        info!(
            "Swapchain {}x{}: {} image(s), {:?}, {:?}{}",
            extent.width,
            extent.height,
            swapchain.image_views.len(),
            surface_format.format,
            present_mode,
            if old_swapchain == vk::SwapchainKHR::null() {
                ""
            } else {
                ", replacing previous"
            }
        );
        Ok(swapchain)
    }

    /// Acquires the next image, signaling `semaphore` once it is ready.
    /// Blocks without a timeout.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.raw, u64::MAX, semaphore, vk::Fence::null())
        };
        classify_acquire(result)
    }

    /// Queues `image_index` for presentation on `queue` after `wait`.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<SwapchainStatus> {
        let swapchains = [self.raw];
        let image_indices = [image_index];
        let wait_semaphores = [wait];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        classify_present(unsafe { self.loader.queue_present(queue, &present_info) })
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.raw
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.image_views.len() as u32
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.raw, None);
        }
        debug!(
            "Swapchain {}x{} destroyed",
            self.extent.width, self.extent.height
        );
    }
}

fn color_view(device: &Device, image: vk::Image, format: vk::Format) -> RhiResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .level_count(1)
                .layer_count(1),
        );
    unsafe { device.handle().create_image_view(&create_info, None) }
        .map_err(|e| RhiError::SwapchainError(format!("swapchain image view: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srgb(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn support(formats: Vec<vk::SurfaceFormatKHR>) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats,
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE],
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_surface_format_preference_order() {
        let all = support(vec![
            srgb(vk::Format::R8G8B8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_SRGB),
        ]);
        assert_eq!(all.surface_format().format, vk::Format::B8G8R8A8_SRGB);

        let unorm = support(vec![
            srgb(vk::Format::R8G8B8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_UNORM),
        ]);
        assert_eq!(unorm.surface_format().format, vk::Format::B8G8R8A8_UNORM);

        let other = support(vec![srgb(vk::Format::R8G8B8A8_UNORM)]);
        assert_eq!(other.surface_format().format, vk::Format::R8G8B8A8_UNORM);

        assert_eq!(
            support(vec![]).surface_format().format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let support = support(vec![]);
        assert_eq!(
            support.present_mode(vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            support.present_mode(vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_adequate_needs_format_and_mode() {
        assert!(support(vec![srgb(vk::Format::B8G8R8A8_SRGB)]).is_adequate());
        assert!(!support(vec![]).is_adequate());

        let mut no_modes = support(vec![srgb(vk::Format::B8G8R8A8_SRGB)]);
        no_modes.present_modes.clear();
        assert!(!no_modes.is_adequate());
    }

    #[test]
    fn test_image_count_one_above_minimum() {
        let mut support = support(vec![]);
        for (min, max, expected) in [(2, 3, 3), (2, 8, 3), (2, 0, 3), (3, 3, 3)] {
            support.capabilities.min_image_count = min;
            support.capabilities.max_image_count = max;
            assert_eq!(support.image_count(), expected, "min {min} max {max}");
        }
    }

    #[test]
    fn test_composite_alpha_prefers_opaque() {
        let mut support = support(vec![]);
        support.capabilities.supported_composite_alpha =
            vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(support.composite_alpha(), vk::CompositeAlphaFlagsKHR::OPAQUE);

        support.capabilities.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(support.composite_alpha(), vk::CompositeAlphaFlagsKHR::INHERIT);
    }

    #[test]
    fn test_extent_follows_surface_when_dictated() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            ..Default::default()
        };
        assert_eq!(
            fit_extent(&capabilities, extent(800, 600)),
            Some(extent(1920, 1080))
        );
    }

    #[test]
    fn test_extent_clamps_request_when_surface_is_flexible() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        };
        assert_eq!(
            fit_extent(&capabilities, extent(3000, 50)),
            Some(extent(2000, 100))
        );
        assert_eq!(
            fit_extent(&capabilities, extent(800, 600)),
            Some(extent(800, 600))
        );
    }

    #[test]
    fn test_minimized_surface_is_not_drawable() {
        // The window still reports its pre-minimize size.
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(0, 0),
            ..Default::default()
        };
        assert_eq!(fit_extent(&capabilities, extent(800, 600)), None);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1024, 0),
            ..Default::default()
        };
        assert_eq!(fit_extent(&capabilities, extent(800, 600)), None);
    }

    #[test]
    fn test_classify_acquire() {
        assert_eq!(
            classify_acquire(Ok((2, false))).ok(),
            Some(AcquireOutcome::Acquired {
                image_index: 2,
                suboptimal: false
            })
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).ok(),
            Some(AcquireOutcome::Acquired {
                image_index: 0,
                suboptimal: true
            })
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).ok(),
            Some(AcquireOutcome::OutOfDate)
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert!(classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }

    #[test]
    fn test_classify_present() {
        assert_eq!(classify_present(Ok(false)).ok(), Some(SwapchainStatus::Optimal));
        assert_eq!(
            classify_present(Ok(true)).ok(),
            Some(SwapchainStatus::Suboptimal)
        );
        assert_eq!(
            classify_present(Err(vk::Result::SUBOPTIMAL_KHR)).ok(),
            Some(SwapchainStatus::Suboptimal)
        );
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).ok(),
            Some(SwapchainStatus::OutOfDate)
        );
        assert!(classify_present(Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)).is_err());
    }

    #[test]
    fn test_only_optimal_keeps_swapchain() {
        assert!(!SwapchainStatus::Optimal.needs_recreate());
        assert!(SwapchainStatus::Suboptimal.needs_recreate());
        assert!(SwapchainStatus::OutOfDate.needs_recreate());
    }
}
