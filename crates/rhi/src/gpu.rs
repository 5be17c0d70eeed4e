//! Choosing the GPU that renders and presents to the window surface.
//!
//! A GPU qualifies when it has a graphics queue family, a family that can
//! present to the surface, `VK_KHR_swapchain`, and at least one surface
//! format and present mode. Among qualifying GPUs the highest [`Gpu::score`]
//! wins.

use ash::vk;
use tracing::{debug, info, trace, warn};

use crate::error::{RhiError, RhiResult};
use crate::swapchain::SurfaceSupport;

/// Queue families used for submission and presentation.
///
/// Both roles usually resolve to the same family on desktop drivers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilies {
    /// Picks families from a GPU's family list, preferring one family that
    /// does both.
    pub fn find(families: &[vk::QueueFamilyProperties], can_present: impl Fn(u32) -> bool) -> Self {
        let mut found = Self::default();
        let usable = families
            .iter()
            .zip(0u32..)
            .filter(|(family, _)| family.queue_count > 0);

        for (family, index) in usable {
            let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = can_present(index);
            trace!("Queue family {}: {:?} present={}", index, family.queue_flags, present);

            if graphics && present {
                return Self {
                    graphics: Some(index),
                    present: Some(index),
                };
            }
            if graphics {
                found.graphics.get_or_insert(index);
            }
            if present {
                found.present.get_or_insert(index);
            }
        }
        found
    }

    /// `(graphics, present)` once both are known.
    #[inline]
    pub fn resolved(&self) -> Option<(u32, u32)> {
        self.graphics.zip(self.present)
    }

    /// Families to create queues on, each listed once.
    pub fn distinct(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        families.dedup();
        families
    }
}

/// A GPU that can drive the window surface.
#[derive(Clone)]
pub struct Gpu {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: QueueFamilies,
    /// Sum of the device-local heaps, in bytes.
    pub local_memory: u64,
}

impl Gpu {
    pub fn name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("unnamed GPU")
    }

    /// Discrete beats integrated beats virtual beats CPU; ties go to the
    /// larger maximum image size, then to more local memory.
    pub fn score(&self) -> u64 {
        let kind = match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 4,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
            vk::PhysicalDeviceType::CPU => 1,
            _ => 0,
        };
        let image_size = u64::from(self.properties.limits.max_image_dimension2_d);
        let local_mib = (self.local_memory >> 20).min(u64::from(u32::MAX));
        (kind << 56) | (image_size.min(0xFFFF) << 32) | local_mib
    }
}

impl std::fmt::Debug for Gpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gpu")
            .field("name", &self.name())
            .field("type", &self.properties.device_type)
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Returns the best GPU for presenting to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no GPU qualifies.
pub fn select_gpu(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<Gpu> {
    let handles = unsafe { instance.enumerate_physical_devices()? };
    info!("{} Vulkan device(s) present", handles.len());

    let best = handles
        .into_iter()
        .filter_map(|handle| qualify(instance, handle, surface, surface_loader))
        .inspect(|gpu| debug!("Candidate {:?}, score {:#x}", gpu, gpu.score()))
        .max_by_key(Gpu::score);

    match best {
        Some(gpu) => {
            let version = gpu.properties.api_version;
            info!(
                "Using '{}' (Vulkan {}.{})",
                gpu.name(),
                vk::api_version_major(version),
                vk::api_version_minor(version)
            );
            Ok(gpu)
        }
        None => {
            warn!("No GPU can render to this window");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn qualify(
    instance: &ash::Instance,
    handle: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<Gpu> {
    let properties = unsafe { instance.get_physical_device_properties(handle) };
    let memory = unsafe { instance.get_physical_device_memory_properties(handle) };
    let gpu = Gpu {
        handle,
        properties,
        queue_families: QueueFamilies::find(
            &unsafe { instance.get_physical_device_queue_family_properties(handle) },
            |index| unsafe {
                surface_loader
                    .get_physical_device_surface_support(handle, index, surface)
                    .unwrap_or(false)
            },
        ),
        local_memory: local_memory(&memory),
    };

    if gpu.queue_families.resolved().is_none() {
        debug!("Skipping '{}': {:?}", gpu.name(), gpu.queue_families);
        return None;
    }

    let extensions =
        unsafe { instance.enumerate_device_extension_properties(handle) }.unwrap_or_default();
    if !extensions
        .iter()
        .any(|ext| ext.extension_name_as_c_str() == Ok(ash::khr::swapchain::NAME))
    {
        debug!("Skipping '{}': no VK_KHR_swapchain", gpu.name());
        return None;
    }

    match SurfaceSupport::query(handle, surface, surface_loader) {
        Ok(support) if support.is_adequate() => Some(gpu),
        Ok(_) => {
            debug!("Skipping '{}': surface offers no format or present mode", gpu.name());
            None
        }
        Err(e) => {
            debug!("Skipping '{}': surface query failed: {}", gpu.name(), e);
            None
        }
    }
}

fn local_memory(memory: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory
        .memory_heaps_as_slice()
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}
