use thiserror::Error;

/// Errors that can occur while decoding an OSC packet.
#[derive(Debug, Error)]
pub enum OscReadError {
    #[error("unexpected end of packet")]
    UnexpectedEof,
    #[error("OSC-string is missing its null terminator")]
    UnterminatedString,
    #[error("invalid utf-8 in OSC-string: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("unknown type tag: {0:?}")]
    UnknownTypeTag(char),
    #[error("invalid size: {0}")]
    InvalidSize(i32),
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),
    #[error("bundle nesting exceeds {0} levels")]
    TooDeep(usize),
}
