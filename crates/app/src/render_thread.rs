//! The thread that owns the renderer and runs the frame loop.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info};
use winit::event_loop::EventLoopProxy;

use vkframe_core::FrameConfig;
use vkframe_platform::{SurfaceState, Window};
use vkframe_renderer::{FrameOutcome, FrameStats, Renderer};
use vkframe_rhi::RhiResult;

use crate::AppEvent;
use crate::demo::PulseHooks;

pub struct RenderThread {
    handle: JoinHandle<()>,
}

impl RenderThread {
    /// Starts rendering to `window`. A fatal error is reported back to the
    /// event loop through `proxy`.
    pub fn spawn(
        window: Window,
        surface: Arc<SurfaceState>,
        config: FrameConfig,
        proxy: EventLoopProxy<AppEvent>,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("render".to_string())
            .spawn(move || match run(window, surface, &config) {
                Ok(stats) => info!(
                    "Render thread finished: {} presented, {} skipped, {} recreation(s)",
                    stats.frames_presented, stats.frames_skipped, stats.recreations
                ),
                Err(e) => {
                    error!("Render thread failed: {}", e);
                    let _ = proxy.send_event(AppEvent::RenderFailed(e.to_string()));
                }
            })?;
        Ok(Self { handle })
    }

    /// Waits for the thread to finish. Returns false if it panicked.
    pub fn join(self) -> bool {
        self.handle.join().is_ok()
    }
}

fn run(window: Window, surface: Arc<SurfaceState>, config: &FrameConfig) -> RhiResult<FrameStats> {
    let mut renderer = Renderer::new(window, surface.clone(), config)?;
    let mut hooks = PulseHooks::new(config.clear_color);
    info!("Entering frame loop");

    while !surface.is_closed() {
        if renderer.render_frame(&mut hooks)? == FrameOutcome::SurfaceClosed {
            break;
        }
    }

    renderer.shutdown()
}
