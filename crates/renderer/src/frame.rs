//! Frame slot bookkeeping.

use ash::vk;

/// Facts about the frame being produced, handed to every hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame slot in `0..frames_in_flight`.
    pub slot: usize,
    /// Swapchain image acquired for this frame.
    pub image_index: u32,
    /// Extent of the current render targets.
    pub extent: vk::Extent2D,
    /// Number of frames presented before this one.
    pub frame_number: u64,
}

/// Round-robin cursor over frame slots.
#[derive(Clone, Copy, Debug)]
pub struct FrameCursor {
    /// Current frame slot (0 to frames_in_flight - 1)
    slot: usize,
    frames_in_flight: usize,
}

impl FrameCursor {
    /// Create a cursor starting at slot 0. `frames_in_flight` must be non-zero.
    pub fn new(frames_in_flight: usize) -> Self {
        debug_assert!(frames_in_flight > 0);
        Self {
            slot: 0,
            frames_in_flight,
        }
    }

    /// Get the current frame slot.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of slots the cursor cycles through.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Advance to the next slot.
    pub fn advance(&mut self) {
        self.slot = (self.slot + 1) % self.frames_in_flight;
    }
}
