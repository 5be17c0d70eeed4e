//! Vulkan loader and instance.
//!
//! The window layer supplies the platform surface extensions, so nothing
//! here branches on the target OS. With validation on, validation messages
//! are forwarded to `tracing` under the `vulkan` target.

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{Level, debug, error, info, warn};

use crate::error::RhiResult;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Loaded Vulkan library plus the instance created from it.
///
/// Surface and device must be dropped before the instance.
pub struct Instance {
    entry: Entry,
    raw: ash::Instance,
    messenger: Option<DebugMessenger>,
}

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    raw: vk::DebugUtilsMessengerEXT,
}

impl Instance {
    /// Loads Vulkan and creates an instance with the surface extensions the
    /// window needs.
    ///
    /// `validation` is a request: if the Khronos layer is not installed the
    /// instance is created without it and a warning is logged.
    ///
    /// # Errors
    ///
    /// Fails if the Vulkan library cannot be loaded or the driver rejects
    /// the instance or the debug messenger.
    pub fn new(
        app_name: &CStr,
        validation: bool,
        surface_extensions: &[*const c_char],
    ) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };
        let validation = validation && validation_layer_installed(&entry)?;

        let version = vk::make_api_version(0, 0, 1, 0);
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(version)
            .engine_name(c"vkframe")
            .engine_version(version)
            .api_version(vk::API_VERSION_1_1);
        let extensions = instance_extensions(surface_extensions, validation);
        let layers = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        let raw = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance up ({} extension(s), validation {})",
            extensions.len(),
            if validation { "on" } else { "off" }
        );

        let messenger = if validation {
            match DebugMessenger::new(&entry, &raw) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { raw.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            raw,
            messenger,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.raw
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(messenger) = self.messenger.take() {
            unsafe {
                messenger
                    .loader
                    .destroy_debug_utils_messenger(messenger.raw, None)
            };
        }
        unsafe { self.raw.destroy_instance(None) };
        info!("Vulkan instance destroyed");
    }
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_validation_message));
        let raw = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        debug!("Validation messages forwarded to the log");
        Ok(Self { loader, raw })
    }
}

fn validation_layer_installed(entry: &Entry) -> RhiResult<bool> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    let installed = layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
    if !installed {
        warn!("{:?} is not installed, running without validation", VALIDATION_LAYER);
    }
    Ok(installed)
}

/// `VK_KHR_surface`, then the window's platform extensions without repeats,
/// then debug utils when validating.
fn instance_extensions(platform: &[*const c_char], validation: bool) -> Vec<*const c_char> {
    let mut names: Vec<&CStr> = vec![ash::khr::surface::NAME];
    // SAFETY: the window layer hands out ash_window's static NUL-terminated
    // names.
    for name in platform.iter().map(|&ptr| unsafe { CStr::from_ptr(ptr) }) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if validation {
        names.push(ash::ext::debug_utils::NAME);
    }
    names.into_iter().map(CStr::as_ptr).collect()
}

fn message_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::INFO
    } else {
        Level::DEBUG
    }
}

unsafe extern "system" fn forward_validation_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the layer passes either null or a callback struct valid for the
    // duration of the call.
    let message = match unsafe { data.as_ref() } {
        Some(data) if !data.p_message.is_null() => unsafe {
            CStr::from_ptr(data.p_message).to_string_lossy()
        },
        _ => Cow::Borrowed("(no message)"),
    };

    let level = message_level(severity);
    if level == Level::ERROR {
        error!(target: "vulkan", "{:?}: {}", kind, message);
    } else if level == Level::WARN {
        warn!(target: "vulkan", "{:?}: {}", kind, message);
    } else if level == Level::INFO {
        info!(target: "vulkan", "{:?}: {}", kind, message);
    } else {
        debug!(target: "vulkan", "{:?}: {}", kind, message);
    }
    vk::FALSE
}
