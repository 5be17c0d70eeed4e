//! Setup-time errors outside the Vulkan layer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Surface plumbing between the window and Vulkan failed.
    #[error("Vulkan surface: {0}")]
    Vulkan(String),

    #[error("Window: {0}")]
    Window(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    /// `vkframe.toml` exists but is not valid TOML for [`Config`](crate::Config).
    #[error("{}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// A config value parsed but is out of range.
    #[error("Invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
