//! Frames-in-flight rendering loop.
//!
//! This crate orchestrates the per-frame work:
//! - Synchronization objects per frame slot
//! - Command recording through application hooks
//! - Swapchain recreation on resize, minimize and out-of-date results
//! - The frame scheduler state machine that ties them together
//!
//! The scheduler is generic over [`Backend`]; [`VulkanBackend`] is the
//! production implementation.

pub mod backend;
pub mod command_recorder;
pub mod depth_buffer;
pub mod frame;
pub mod frame_scheduler;
pub mod hooks;
pub mod render_targets;
pub mod renderer;
pub mod swapchain_controller;
pub mod sync_objects;
pub mod vulkan_backend;

pub use backend::{Backend, TargetInfo};
pub use command_recorder::CommandRecorder;
pub use frame::{FrameCursor, FrameInfo};
pub use frame_scheduler::{FrameOutcome, FrameScheduler, FrameState, FrameStats};
pub use hooks::{ClearHooks, FrameHooks, RecordContext};
pub use render_targets::RenderTargets;
pub use renderer::Renderer;
pub use swapchain_controller::{RecreateOutcome, SwapchainController};
pub use sync_objects::{FrameSync, SyncObjectSet};
pub use vulkan_backend::VulkanBackend;
