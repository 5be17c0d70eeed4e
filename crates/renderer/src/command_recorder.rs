//! Records one frame's command buffer.

use tracing::trace;

use vkframe_rhi::RhiResult;

use crate::backend::Backend;
use crate::frame::FrameInfo;
use crate::hooks::{FrameHooks, RecordContext};

/// Records the per-frame command buffer in a fixed order:
/// begin, render pass (clear), scene, overlay, end render pass, end.
pub struct CommandRecorder;

impl CommandRecorder {
    /// Records `cmd` for the image in `frame`.
    ///
    /// The caller must have waited on the fence of the submission that last
    /// used `cmd`.
    ///
    /// # Errors
    ///
    /// Returns the first error from the backend or a hook. The command buffer
    /// is then left unfinished and must not be submitted.
    pub fn record<B, H>(
        backend: &B,
        cmd: &B::CommandBuffer,
        targets: &B::Targets,
        frame: &FrameInfo,
        hooks: &mut H,
    ) -> RhiResult<()>
    where
        B: Backend,
        H: FrameHooks<B> + ?Sized,
    {
        backend.begin_commands(cmd)?;
        backend.begin_render_pass(cmd, targets, frame.image_index, hooks.clear_color(frame))?;

        let ctx = RecordContext::new(backend, cmd, targets, frame);
        hooks.record(&ctx)?;
        hooks.overlay(&ctx)?;

        backend.end_render_pass(cmd);
        backend.end_commands(cmd)?;

        trace!(
            "Recorded frame {} (slot {}, image {})",
            frame.frame_number, frame.slot, frame.image_index
        );
        Ok(())
    }
}
