//! Surface state shared between the event-loop thread and the render thread.
//!
//! The event loop owns the window and receives resize and close events; the
//! frame loop runs elsewhere and only ever sees this state. Waiting is done
//! on a condition variable, so a minimized window costs no CPU while the
//! render thread is parked in [`SurfaceEvents::wait_events`].

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

/// What the frame loop needs to know about the presentation surface.
pub trait SurfaceEvents {
    /// Current framebuffer size in pixels. Either dimension may be zero while
    /// the window is minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Blocks until the platform reports a change (or a poll interval
    /// passes). Returns `false` once the surface is closing.
    fn wait_events(&self) -> bool;

    /// Reads and clears the resize flag.
    fn take_resized(&self) -> bool;
}

#[derive(Debug)]
struct Inner {
    width: u32,
    height: u32,
    resized: bool,
    closed: bool,
}

/// Thread-safe [`SurfaceEvents`] implementation fed by window events.
#[derive(Debug)]
pub struct SurfaceState {
    inner: Mutex<Inner>,
    changed: Condvar,
    poll_interval: Duration,
}

impl SurfaceState {
    /// Creates the state for a window whose framebuffer is `width` x `height`.
    ///
    /// `poll_interval` bounds how long a single [`wait_events`](SurfaceEvents::wait_events)
    /// call may block without a notification.
    pub fn new(width: u32, height: u32, poll_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                width,
                height,
                resized: false,
                closed: false,
            }),
            changed: Condvar::new(),
            poll_interval,
        }
    }

    /// Records a new framebuffer size and raises the resize flag.
    pub fn notify_resized(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock();
        inner.width = width;
        inner.height = height;
        inner.resized = true;
        drop(inner);

        debug!("Surface resized to {}x{}", width, height);
        self.changed.notify_all();
    }

    /// Marks the surface as closing and wakes every waiter.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        info!("Surface closing");
        self.changed.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl SurfaceEvents for SurfaceState {
    fn framebuffer_size(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.width, inner.height)
    }

    fn wait_events(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        // Timeouts and spurious wakeups are fine, callers re-check in a loop.
        let _ = self.changed.wait_for(&mut inner, self.poll_interval);
        !inner.closed
    }

    fn take_resized(&self) -> bool {
        std::mem::take(&mut self.inner.lock().resized)
    }
}
