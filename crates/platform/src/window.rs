//! The winit window the frames are presented to, and its Vulkan surface.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkframe_core::{Error, Result, WindowConfig};

/// `VkSurfaceKHR` for a [`Window`], destroyed on drop.
///
/// Must be dropped before the instance it was created from.
pub struct Surface {
    raw: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.raw
    }

    /// Loader for surface capability, format and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: `raw` came from the instance behind `loader` and is only
        // destroyed here.
        unsafe { self.loader.destroy_surface(self.raw, None) };
        debug!("Vulkan surface destroyed");
    }
}

/// Shared handle to the application window.
///
/// The event-loop thread and the render thread each hold a clone.
#[derive(Clone)]
pub struct Window {
    raw: Arc<WinitWindow>,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let raw = event_loop
            .create_window(attributes(config))
            .map_err(|e| Error::Window(e.to_string()))?;
        info!("Window '{}' opened at {}x{}", config.title, config.width, config.height);
        Ok(Self { raw: Arc::new(raw) })
    }

    /// Drawable size in physical pixels; zero while minimized on some
    /// platforms.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.raw.inner_size();
        (size.width, size.height)
    }

    /// Instance extensions a surface for this window needs. The pointers
    /// are static strings owned by `ash_window`.
    pub fn surface_extensions(&self) -> Result<Vec<*const c_char>> {
        let (display, _) = self.raw_handles()?;
        let extensions = ash_window::enumerate_required_extensions(display)
            .map_err(|e| Error::Vulkan(format!("no surface extensions for this platform: {}", e)))?;
        // SAFETY: ash_window only returns static NUL-terminated names.
        debug!(
            "Surface extensions: {:?}",
            extensions
                .iter()
                .map(|&name| unsafe { CStr::from_ptr(name) })
                .collect::<Vec<_>>()
        );
        Ok(extensions.to_vec())
    }

    /// Creates a surface for this window on `instance`, which must outlive
    /// the returned [`Surface`].
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let (display, window) = self.raw_handles()?;
        // SAFETY: both handles come from the live winit window, which this
        // value keeps alive; the surface is destroyed in Surface::drop.
        let raw = unsafe { ash_window::create_surface(entry, instance, display, window, None) }
            .map_err(|e| Error::Vulkan(format!("surface creation failed: {}", e)))?;
        info!("Vulkan surface created");
        Ok(Surface {
            raw,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle)> {
        let display = self
            .raw
            .display_handle()
            .map_err(|e| Error::Window(format!("display handle unavailable: {}", e)))?;
        let window = self
            .raw
            .window_handle()
            .map_err(|e| Error::Window(format!("window handle unavailable: {}", e)))?;
        Ok((display.as_raw(), window.as_raw()))
    }
}

fn attributes(config: &WindowConfig) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(true)
}
