//! AMCP response model.

use std::fmt;

/// How many payload lines follow a status line with a given code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// No payload; the status line is the whole frame.
    None,
    /// Exactly one `\r\n`-terminated payload line; it may contain bare `\n`.
    SingleLine,
    /// Payload lines until an empty line.
    MultiLine,
}

impl PayloadKind {
    /// Payload shape for a return code.
    pub const fn for_code(code: u16) -> Self {
        match code {
            200 => Self::MultiLine,
            201 | 400 => Self::SingleLine,
            _ => Self::None,
        }
    }
}

/// A complete AMCP response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmcpResponse {
    /// Numeric return code (`201`, `404`, ...)
    pub code: u16,
    /// Remainder of the status line (`VERSION OK`, `INFO ERROR`, ...)
    pub status: String,
    /// Payload lines, without terminators
    pub data: Vec<String>,
}

impl AmcpResponse {
    pub fn new(code: u16, status: impl Into<String>, data: Vec<String>) -> Self {
        Self {
            code,
            status: status.into(),
            data,
        }
    }

    /// Build a failure response locally, without any server involvement.
    ///
    /// Used by clients to report transport problems through the same type as
    /// protocol-level errors.
    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message, Vec::new())
    }

    /// `2xx` codes are successes, everything else is a failure.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Payload joined with `\n`.
    pub fn payload(&self) -> String {
        self.data.join("\n")
    }

    /// First payload line, if any.
    pub fn first_line(&self) -> Option<&str> {
        self.data.first().map(String::as_str)
    }
}

impl fmt::Display for AmcpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.status)
        }
    }
}
