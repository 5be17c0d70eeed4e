//! Logical device, its queues and the depth-attachment allocator.
//!
//! The frame loop submits to a single graphics queue and presents on a
//! present queue, which is the same queue when both roles share a family.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::gpu::{Gpu, QueueFamilies};

/// Device extensions the frame loop needs.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Pipeline stage at which a frame submission waits for its swapchain image.
pub const IMAGE_WAIT_STAGE: vk::PipelineStageFlags =
    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

/// Handles to one frame's queue submission.
#[derive(Clone, Copy, Debug)]
pub struct FrameSubmission {
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by acquire; waited on at [`IMAGE_WAIT_STAGE`].
    pub image_available: vk::Semaphore,
    /// Signaled when rendering completes; present waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when the whole submission has executed.
    pub in_flight: vk::Fence,
}

/// Logical device shared through `Arc` by every object created from it.
///
/// # Resource Destruction
///
/// Dropping waits for idle, drops the allocator (which frees its memory
/// blocks through the device), then destroys the device.
pub struct Device {
    raw: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    allocator: ManuallyDrop<Mutex<Allocator>>,
}

impl Device {
    /// Creates the device with one queue per distinct graphics/present
    /// family and `VK_KHR_swapchain` enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if either queue family is missing, or device or
    /// allocator creation fails.
    pub fn new(instance: &Instance, gpu: &Gpu) -> RhiResult<Arc<Self>> {
        let families = gpu.queue_families;
        let Some((graphics_family, present_family)) = families.resolved() else {
            return Err(RhiError::InvalidArgument(
                "physical device has no graphics/present queue family".to_string(),
            ));
        };

        let priorities = [1.0f32];
        let queue_infos: Vec<_> = families
            .distinct()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();
        let extensions: Vec<_> = DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions);
        let raw = unsafe {
            instance
                .handle()
                .create_device(gpu.handle, &create_info, None)?
        };

        let (graphics_queue, present_queue) = unsafe {
            (
                raw.get_device_queue(graphics_family, 0),
                raw.get_device_queue(present_family, 0),
            )
        };
        debug!(
            "Queues: graphics family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: raw.clone(),
            physical_device: gpu.handle,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { raw.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("Logical device ready on {}", gpu.name());

        Ok(Arc::new(Self {
            raw,
            physical_device: gpu.handle,
            queue_families: families,
            graphics_queue,
            present_queue,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.raw
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Allocator for device-local attachments.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Blocks until every queue is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.raw.device_wait_idle()? };
        Ok(())
    }

    /// Submits one frame's command buffer to the graphics queue.
    ///
    /// # Safety
    ///
    /// Every handle in `frame` must belong to this device and stay alive
    /// until `frame.in_flight` signals. The command buffer must be fully
    /// recorded and the fence unsignaled.
    pub unsafe fn submit_frame(&self, frame: &FrameSubmission) -> RhiResult<()> {
        let wait = [frame.image_available];
        let stages = [IMAGE_WAIT_STAGE];
        let command_buffers = [frame.command_buffer];
        let signal = [frame.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal);

        unsafe {
            self.raw
                .queue_submit(self.graphics_queue, &[submit_info], frame.in_flight)?
        };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            error!("Device wait idle failed during drop: {:?}", e);
        }
        // SAFETY: the allocator is dropped exactly once, here, while the
        // device it frees memory through is still alive.
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
            self.raw.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device is Send + Sync, the remaining fields are plain handles
// and the allocator sits behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
