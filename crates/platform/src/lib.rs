//! Platform layer for vkframe.
//!
//! This crate provides:
//! - Window management via winit and Vulkan surface creation
//! - [`SurfaceState`], the resize/close signal shared with the render thread
//! - The [`SurfaceEvents`] trait the frame loop waits on

mod surface_state;
mod window;

pub use surface_state::{SurfaceEvents, SurfaceState};
pub use window::{Surface, Window};
