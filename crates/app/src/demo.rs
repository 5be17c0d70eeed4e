//! Clear-colour demo.
//!
//! Each frame slot gets its own pulsing clear colour in `update_frame`, the
//! stand-in for per-frame uniform data. A strip along the bottom edge is
//! cleared in the overlay pass to show where a UI layer would draw.

use std::f32::consts::TAU;
use std::time::Instant;

use tracing::info;

use vkframe_renderer::{FrameHooks, FrameInfo, RecordContext, VulkanBackend};
use vkframe_rhi::{RhiResult, vk};

/// Seconds per full pulse.
const PULSE_PERIOD: f32 = 4.0;

/// Height of the overlay strip in pixels.
const OVERLAY_HEIGHT: u32 = 8;

pub struct PulseHooks {
    base: [f32; 4],
    started: Instant,
    elapsed: f32,
    /// Clear colour per frame slot.
    colors: Vec<[f32; 4]>,
    aspect_ratio: f32,
}

impl PulseHooks {
    pub fn new(base: [f32; 4]) -> Self {
        Self {
            base,
            started: Instant::now(),
            elapsed: 0.0,
            colors: Vec::new(),
            aspect_ratio: 1.0,
        }
    }
}

impl FrameHooks<VulkanBackend> for PulseHooks {
    fn update_frame(&mut self, frame: &FrameInfo) -> RhiResult<()> {
        if self.colors.len() <= frame.slot {
            self.colors.resize(frame.slot + 1, self.base);
        }
        self.elapsed = self.started.elapsed().as_secs_f32();
        self.colors[frame.slot] = pulse_color(self.base, self.elapsed);
        Ok(())
    }

    fn clear_color(&self, frame: &FrameInfo) -> [f32; 4] {
        self.colors.get(frame.slot).copied().unwrap_or(self.base)
    }

    fn overlay(&mut self, ctx: &RecordContext<'_, VulkanBackend>) -> RhiResult<()> {
        let Some(rect) = overlay_rect(ctx.frame().extent, self.elapsed) else {
            return Ok(());
        };

        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.9, 0.9, 0.9, 1.0],
                },
            },
        };
        let clear_rect = vk::ClearRect {
            rect,
            base_array_layer: 0,
            layer_count: 1,
        };
        ctx.command_buffer()
            .clear_attachments(&[attachment], &[clear_rect]);
        Ok(())
    }

    fn on_resize(&mut self, extent: vk::Extent2D) {
        self.aspect_ratio = extent.width as f32 / extent.height.max(1) as f32;
        info!(
            "View changed to {}x{} (aspect {:.3})",
            extent.width, extent.height, self.aspect_ratio
        );
    }
}

/// Brightens `base` towards white and back over [`PULSE_PERIOD`] seconds.
/// Alpha is left untouched.
fn pulse_color(base: [f32; 4], seconds: f32) -> [f32; 4] {
    let phase = (seconds / PULSE_PERIOD * TAU).sin() * 0.5 + 0.5;
    let mix = |c: f32| (c + (1.0 - c) * phase * 0.5).clamp(0.0, 1.0);
    [mix(base[0]), mix(base[1]), mix(base[2]), base[3]]
}

/// Bottom strip whose width sweeps across the target once per pulse.
fn overlay_rect(extent: vk::Extent2D, seconds: f32) -> Option<vk::Rect2D> {
    if extent.width == 0 || extent.height < OVERLAY_HEIGHT {
        return None;
    }
    let progress = (seconds / PULSE_PERIOD).fract();
    let width = ((extent.width as f32 * progress) as u32).clamp(1, extent.width);
    Some(vk::Rect2D {
        offset: vk::Offset2D {
            x: 0,
            y: (extent.height - OVERLAY_HEIGHT) as i32,
        },
        extent: vk::Extent2D {
            width,
            height: OVERLAY_HEIGHT,
        },
    })
}
