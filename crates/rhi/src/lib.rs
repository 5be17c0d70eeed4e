//! Vulkan objects the vkframe frame loop is built from.
//!
//! Each type owns one Vulkan object (or a small fixed group, like a
//! swapchain and its image views) and destroys it on drop. Everything that
//! needs the logical device holds it through `Arc<Device>`, so the device
//! outlives its users by construction. The instance and surface are the
//! exception and must be dropped last by their owner.

mod error;

pub mod command;
pub mod device;
pub mod framebuffer;
pub mod gpu;
pub mod instance;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
