//! Core utilities for the vkframe crates.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame-rate measurement
//! - Configuration loading

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    CONFIG_FILE_NAME, Config, ConfigSource, DEFAULT_FRAMES_IN_FLIGHT, FrameConfig, LoggingConfig,
    MAX_FRAMES_IN_FLIGHT, PresentModePreference, WindowConfig,
};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
pub use timer::{FPS_WINDOW, FrameTimer};
