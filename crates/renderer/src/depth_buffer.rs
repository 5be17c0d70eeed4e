//! Depth attachment shared by every framebuffer of one swapchain generation.
//!
//! Frames in flight reuse the same image; submissions on the single graphics
//! queue never overlap their depth writes.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use vkframe_rhi::device::Device;
use vkframe_rhi::{RhiError, RhiResult};

/// GPU-only depth image and its view, sized to the swapchain.
///
/// Dropping destroys the view and the image, then returns the memory to the
/// device's allocator.
pub struct DepthBuffer {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    memory: Option<Allocation>,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "depth buffer of {}x{}",
                extent.width, extent.height
            )));
        }

        let image = unsafe { device.handle().create_image(&image_info(extent, format), None)? };
        // Drop releases whatever has been created if a later step fails.
        let mut depth = Self {
            device,
            image,
            view: vk::ImageView::null(),
            memory: None,
            extent,
        };

        let raw = depth.device.handle();
        let requirements = unsafe { raw.get_image_memory_requirements(image) };
        let memory = depth
            .device
            .allocator()
            .lock()
            .map_err(|_| RhiError::InvalidHandle("allocator lock poisoned".to_string()))?
            .allocate(&AllocationCreateDesc {
                name: "depth",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?;
        let bound = unsafe { raw.bind_image_memory(image, memory.memory(), memory.offset()) };
        depth.memory = Some(memory);
        bound?;

        depth.view = unsafe { raw.create_image_view(&view_info(image, format), None)? };
        debug!(
            "Depth buffer {}x{} ({:?}, {} bytes)",
            extent.width, extent.height, format, requirements.size
        );
        Ok(depth)
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        let raw = self.device.handle();
        unsafe {
            if self.view != vk::ImageView::null() {
                raw.destroy_image_view(self.view, None);
            }
            raw.destroy_image(self.image, None);
        }

        if let Some(memory) = self.memory.take() {
            let freed = match self.device.allocator().lock() {
                Ok(mut allocator) => allocator.free(memory).map_err(|e| e.to_string()),
                Err(_) => Err("allocator lock poisoned".to_string()),
            };
            if let Err(e) = freed {
                error!("Depth buffer memory leaked: {}", e);
            }
        }
        debug!(
            "Depth buffer {}x{} destroyed",
            self.extent.width, self.extent.height
        );
    }
}

fn image_info(extent: vk::Extent2D, format: vk::Format) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(extent.into())
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
}

fn view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::DEPTH)
                .level_count(1)
                .layer_count(1),
        )
}
