//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown video mode {mode:?} on CasparCG channel {channel}")]
    UnknownVideoMode { channel: u32, mode: String },

    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn unknown_video_mode(channel: u32, mode: impl Into<String>) -> Self {
        Self::UnknownVideoMode {
            channel,
            mode: mode.into(),
        }
    }
}
