//! Frame-rate measurement.

use std::time::{Duration, Instant};

/// Length of the window over which the frame rate is averaged.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Counts presented frames and reports the average rate once per window.
///
/// This mirrors the frame counter / "last FPS" pair a render loop usually
/// keeps for its title bar or overlay.
#[derive(Debug)]
pub struct FrameTimer {
    window_start: Instant,
    frames_in_window: u32,
    last_fps: Option<f32>,
}

impl FrameTimer {
    /// Create a new timer whose first window starts now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a timer whose first window starts at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            window_start: start,
            frames_in_window: 0,
            last_fps: None,
        }
    }

    /// Record one frame. Returns the averaged rate when a window closes.
    pub fn tick(&mut self) -> Option<f32> {
        self.tick_at(Instant::now())
    }

    /// Record one frame observed at `now`.
    pub fn tick_at(&mut self, now: Instant) -> Option<f32> {
        self.frames_in_window += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }

        let fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
        self.window_start = now;
        self.frames_in_window = 0;
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// The rate reported by the most recently closed window.
    pub fn last_fps(&self) -> Option<f32> {
        self.last_fps
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
