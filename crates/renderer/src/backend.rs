//! The graphics API seam of the frame loop.
//!
//! [`Backend`] is the small set of operations the frame scheduler needs:
//! synchronization objects, command recording, submission, swapchain-bound
//! render targets, acquire and present. The Vulkan implementation lives in
//! [`crate::vulkan_backend`]; tests drive the scheduler with a scripted
//! implementation instead.
//!
//! Every resource is an owned value and is released by dropping it.

use ash::vk;

use vkframe_rhi::RhiResult;
use vkframe_rhi::swapchain::{AcquireOutcome, SwapchainStatus};

/// Read-only facts about one generation of render targets.
pub trait TargetInfo {
    /// Extent of the swapchain images and attachments.
    fn extent(&self) -> vk::Extent2D;

    /// Number of presentable images in this generation.
    fn image_count(&self) -> u32;
}

/// Operations the frame loop performs against the graphics API.
///
/// Implementations are driven from a single thread. Methods take `&self`;
/// backends that keep mutable bookkeeping use interior mutability.
pub trait Backend {
    /// CPU-waitable completion signal of one submission.
    type Fence;
    /// GPU-side ordering signal between acquire, submit and present.
    type Semaphore;
    /// A resettable primary command buffer.
    type CommandBuffer;
    /// Swapchain and everything sized from it, built and released as a unit.
    type Targets: TargetInfo;

    /// Creates a fence, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> RhiResult<Self::Fence>;

    /// Creates an unsignaled binary semaphore.
    fn create_semaphore(&self) -> RhiResult<Self::Semaphore>;

    /// Blocks without a timeout until `fence` is signaled.
    fn wait_for_fence(&self, fence: &Self::Fence) -> RhiResult<()>;

    /// Returns `fence` to the unsignaled state. It must not be pending.
    fn reset_fence(&self, fence: &Self::Fence) -> RhiResult<()>;

    /// Allocates a command buffer that can be reset and re-recorded.
    fn allocate_command_buffer(&self) -> RhiResult<Self::CommandBuffer>;

    /// Resets `cmd` and begins recording a one-time submission.
    fn begin_commands(&self, cmd: &Self::CommandBuffer) -> RhiResult<()>;

    /// Begins the render pass on the framebuffer of `image_index`, clearing
    /// color to `clear_color`, and sets viewport and scissor to the full
    /// target extent.
    fn begin_render_pass(
        &self,
        cmd: &Self::CommandBuffer,
        targets: &Self::Targets,
        image_index: u32,
        clear_color: [f32; 4],
    ) -> RhiResult<()>;

    /// Ends the render pass begun by [`begin_render_pass`](Self::begin_render_pass).
    fn end_render_pass(&self, cmd: &Self::CommandBuffer);

    /// Finishes recording.
    fn end_commands(&self, cmd: &Self::CommandBuffer) -> RhiResult<()>;

    /// Submits `cmd` to the graphics queue. The submission waits on `wait`
    /// at the color-attachment-output stage, signals `signal` and then
    /// `fence` on completion.
    fn submit(
        &self,
        cmd: &Self::CommandBuffer,
        wait: &Self::Semaphore,
        signal: &Self::Semaphore,
        fence: &Self::Fence,
    ) -> RhiResult<()>;

    /// Extent a swapchain built now would have for a window whose
    /// framebuffer is `framebuffer`, or `None` while the surface has no
    /// drawable area. The surface can reach zero size before the window
    /// system reports it.
    fn drawable_extent(&self, framebuffer: vk::Extent2D) -> RhiResult<Option<vk::Extent2D>>;

    /// Builds a complete set of render targets for `extent`.
    ///
    /// When `retired` is given, its size-dependent resources are released
    /// first and its swapchain is handed over as the old swapchain, then
    /// released. The caller must have waited for the device to go idle.
    fn create_targets(
        &self,
        extent: vk::Extent2D,
        retired: Option<Self::Targets>,
    ) -> RhiResult<Self::Targets>;

    /// Acquires the next presentable image, signaling `signal` when it is ready.
    fn acquire_next_image(
        &self,
        targets: &Self::Targets,
        signal: &Self::Semaphore,
    ) -> RhiResult<AcquireOutcome>;

    /// Queues `image_index` for presentation once `wait` is signaled.
    fn present(
        &self,
        targets: &Self::Targets,
        image_index: u32,
        wait: &Self::Semaphore,
    ) -> RhiResult<SwapchainStatus>;

    /// Blocks until all submitted work has completed.
    fn wait_idle(&self) -> RhiResult<()>;
}
