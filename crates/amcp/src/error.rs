//! AMCP error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, AmcpError>;

/// Errors produced while framing AMCP traffic.
#[derive(Error, Debug)]
pub enum AmcpError {
    /// IO errors from the underlying transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The first line of a response did not start with a numeric code
    #[error("Invalid status line: {0:?}")]
    InvalidStatusLine(String),

    /// A response grew past the configured limit without completing
    #[error("Response exceeds maximum length of {0} bytes")]
    FrameTooLong(usize),

    /// Commands are single lines; embedded line breaks would desync the stream
    #[error("Command contains a line break: {0:?}")]
    InvalidCommand(String),
}
