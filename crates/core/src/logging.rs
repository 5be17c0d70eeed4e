//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor the config provides one.
pub const DEFAULT_LOG_FILTER: &str = "info,vkframe=debug";

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` takes precedence over `default_filter`, so a user can raise
/// the frame loop to `trace` without editing the config file.
///
/// Calling this more than once is harmless; later calls are ignored.
///
/// # Example
/// ```
/// vkframe_core::init_logging(vkframe_core::DEFAULT_LOG_FILTER);
/// tracing::info!("Frame loop starting");
/// ```
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init();
}
