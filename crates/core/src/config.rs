//! Configuration loaded from `vkframe.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! A file that exists but does not parse, or holds out-of-range values, is a
//! startup error: the frame loop is never entered with a config the user did
//! not intend.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOG_FILTER;

/// File name looked up in the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "vkframe.toml";

/// Frames in flight when the file does not say otherwise.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound accepted for `frames.frames_in_flight`.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Where a loaded [`Config`] came from.
///
/// `load` runs before logging is initialized, so the caller logs this once
/// the subscriber is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file at the path; every value is a default.
    Defaults { missing: PathBuf },
    /// Parsed from this file.
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults { missing } => {
                write!(f, "no config at {}, using defaults", missing.display())
            }
            Self::File(path) => write!(f, "config loaded from {}", path.display()),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Frame loop settings.
    pub frames: FrameConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Window settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// Window title.
    pub title: String,
    /// Initial inner width in physical pixels.
    pub width: u32,
    /// Initial inner height in physical pixels.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vkframe".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Presentation mode the swapchain should prefer.
///
/// FIFO is always available, so every other choice falls back to it.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresentModePreference {
    /// VSync; guaranteed to be supported.
    #[default]
    Fifo,
    /// Low latency without tearing, when supported.
    Mailbox,
    /// No synchronization with the display; may tear.
    Immediate,
}

/// Frame loop settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Number of frame slots whose GPU work may be outstanding at once.
    pub frames_in_flight: usize,
    /// Preferred presentation mode.
    pub present_mode: PresentModePreference,
    /// Colour the render pass clears to when the hooks do not override it.
    pub clear_color: [f32; 4],
    /// Upper bound on one blocking wait while the window is minimized.
    pub minimized_poll_ms: u64,
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            present_mode: PresentModePreference::Fifo,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            minimized_poll_ms: 100,
            validation: cfg!(debug_assertions),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// A missing file yields the defaults. Nothing is logged here; the
    /// returned [`ConfigSource`] says which case applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// contains invalid values.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
        if !path.exists() {
            return Ok((
                Self::default(),
                ConfigSource::Defaults {
                    missing: path.to_path_buf(),
                },
            ));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
        config.validate()?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    /// Parses and validates a configuration held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or holds invalid values.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| Error::ConfigParse {
            path: CONFIG_FILE_NAME.into(),
            message: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let frames = self.frames.frames_in_flight;
        if frames == 0 || frames > MAX_FRAMES_IN_FLIGHT {
            return Err(Error::Config(format!(
                "frames.frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT}, got {frames}"
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if self.frames.minimized_poll_ms == 0 {
            return Err(Error::Config(
                "frames.minimized_poll_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(c) = self
            .frames
            .clear_color
            .iter()
            .find(|c| !(0.0..=1.0).contains(*c))
        {
            return Err(Error::Config(format!(
                "frames.clear_color components must be in 0.0..=1.0, got {c}"
            )));
        }

        Ok(())
    }
}
