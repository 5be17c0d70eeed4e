//! Errors raised by the Vulkan layer.

use ash::vk;
use thiserror::Error;

/// Failure of a Vulkan-layer operation.
///
/// Every variant is fatal to the frame loop. A stale swapchain is not an
/// error: acquire and present report it through
/// [`AcquireOutcome`](crate::swapchain::AcquireOutcome) and
/// [`SwapchainStatus`](crate::swapchain::SwapchainStatus).
#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan call failed: {0}")]
    VulkanError(#[from] vk::Result),

    #[error("Vulkan library unavailable: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("GPU memory allocation failed: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    #[error("No GPU can render and present to this window")]
    NoSuitableGpu,

    #[error("Surface: {0}")]
    SurfaceError(String),

    #[error("Swapchain: {0}")]
    SwapchainError(String),

    /// A handle or shared object is unusable, e.g. a poisoned allocator lock.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl RhiError {
    /// The GPU was lost; nothing created on the device can be used again.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::VulkanError(vk::Result::ERROR_DEVICE_LOST))
    }
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
