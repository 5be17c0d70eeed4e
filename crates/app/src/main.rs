//! vkframe - Main Entry Point
//!
//! Opens a window and drives a frames-in-flight Vulkan loop on a dedicated
//! render thread. The event loop only forwards resize and close events.

mod demo;
mod render_thread;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::WindowId;

use vkframe_core::{CONFIG_FILE_NAME, Config};
use vkframe_platform::{SurfaceState, Window};

use crate::render_thread::RenderThread;

/// Messages from the render thread to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    RenderFailed(String),
}

struct App {
    config: Config,
    proxy: EventLoopProxy<AppEvent>,
    window: Option<Window>,
    surface: Option<Arc<SurfaceState>>,
    render_thread: Option<RenderThread>,
    failed: bool,
}

impl App {
    fn new(config: Config, proxy: EventLoopProxy<AppEvent>) -> Self {
        Self {
            config,
            proxy,
            window: None,
            surface: None,
            render_thread: None,
            failed: false,
        }
    }

    /// Closes the surface and waits for the render thread to shut down.
    fn stop(&mut self) {
        if let Some(surface) = &self.surface {
            surface.close();
        }
        if let Some(thread) = self.render_thread.take()
            && !thread.join()
        {
            error!("Render thread panicked");
            self.failed = true;
        }
        self.window = None;
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.failed = true;
                event_loop.exit();
                return;
            }
        };

        let (width, height) = window.framebuffer_size();
        let poll_interval = Duration::from_millis(self.config.frames.minimized_poll_ms);
        let surface = Arc::new(SurfaceState::new(width, height, poll_interval));

        match RenderThread::spawn(
            window.clone(),
            surface.clone(),
            self.config.frames.clone(),
            self.proxy.clone(),
        ) {
            Ok(thread) => {
                info!("Render thread started");
                self.render_thread = Some(thread);
                self.surface = Some(surface);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to spawn render thread: {}", e);
                self.failed = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(surface) = &self.surface {
                    surface.notify_resized(size.width, size.height);
                }
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::RenderFailed(message) => {
                error!("Stopping after render failure: {}", message);
                self.failed = true;
                self.stop();
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.render_thread.is_some() {
            warn!("Event loop exiting with the render thread still running");
            self.stop();
        }
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE_NAME), PathBuf::from);
    let (config, source) = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    vkframe_core::init_logging(&config.logging.filter);
    info!("Starting vkframe ({})", source);
    debug!("{:?}", config);

    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    if app.failed {
        bail!("vkframe stopped after a fatal error");
    }
    info!("Goodbye");
    Ok(())
}
