use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{AmcpError, Result};
use crate::response::{AmcpResponse, PayloadKind};

/// Default upper bound for a single buffered response (1 MiB).
///
/// `INFO` on a busy server can return a few hundred KiB of XML.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Line terminator used for outgoing commands.
const CRLF: &[u8] = b"\r\n";

/// Frames AMCP commands and responses.
#[derive(Debug, Clone, Copy)]
pub struct AmcpCodec {
    max_frame_length: usize,
}

impl AmcpCodec {
    pub const fn new() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    pub const fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }

    pub const fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Default for AmcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// A line located in the read buffer.
struct Line {
    /// Offset of the first byte of the line
    start: usize,
    /// Offset one past the last content byte (terminator excluded)
    end: usize,
    /// Offset of the first byte after the terminator
    next: usize,
}

/// Find the next `\n`-terminated line starting at `from`, stripping an
/// optional `\r` before the `\n`.
fn next_line(buf: &[u8], from: usize) -> Option<Line> {
    let offset = buf.get(from..)?.iter().position(|b| *b == b'\n')?;
    let newline = from + offset;
    let end = if newline > from && buf[newline - 1] == b'\r' {
        newline - 1
    } else {
        newline
    };
    Some(Line {
        start: from,
        end,
        next: newline + 1,
    })
}

/// Find the next `\r\n`-terminated line starting at `from`. Bare `\n`
/// bytes stay part of the line.
///
/// `201` payloads such as `INFO n` are multi-line XML documents that only
/// carry `\r\n` after the last line.
fn next_crlf_line(buf: &[u8], from: usize) -> Option<Line> {
    let offset = buf.get(from..)?.windows(CRLF.len()).position(|w| w == CRLF)?;
    let end = from + offset;
    Some(Line {
        start: from,
        end,
        next: end + CRLF.len(),
    })
}

fn line_text(buf: &[u8], line: &Line) -> String {
    String::from_utf8_lossy(&buf[line.start..line.end]).into_owned()
}

fn parse_status_line(text: &str) -> Result<(u16, String)> {
    let trimmed = text.trim();
    let (code, status) = match trimmed.split_once(' ') {
        Some((code, status)) => (code, status.trim()),
        None => (trimmed, ""),
    };
    let code = code
        .parse::<u16>()
        .map_err(|_| AmcpError::InvalidStatusLine(text.to_string()))?;
    Ok((code, status.to_string()))
}

impl Decoder for AmcpCodec {
    type Item = AmcpResponse;
    type Error = AmcpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AmcpResponse>> {
        let Some(status) = next_line(src, 0) else {
            return self.check_length(src.len());
        };

        let (code, status_text) = parse_status_line(&line_text(src, &status))?;
        let mut data = Vec::new();
        let mut cursor = status.next;

        match PayloadKind::for_code(code) {
            PayloadKind::None => {}
            PayloadKind::SingleLine => {
                let Some(line) = next_crlf_line(src, cursor) else {
                    return self.check_length(src.len());
                };
                data.push(line_text(src, &line));
                cursor = line.next;
            }
            PayloadKind::MultiLine => loop {
                let Some(line) = next_line(src, cursor) else {
                    return self.check_length(src.len());
                };
                cursor = line.next;
                if line.start == line.end {
                    break;
                }
                data.push(line_text(src, &line));
            },
        }

        let _ = src.split_to(cursor);
        Ok(Some(AmcpResponse::new(code, status_text, data)))
    }
}

impl AmcpCodec {
    fn check_length(&self, buffered: usize) -> Result<Option<AmcpResponse>> {
        if buffered > self.max_frame_length {
            Err(AmcpError::FrameTooLong(self.max_frame_length))
        } else {
            Ok(None)
        }
    }
}

impl Encoder<&str> for AmcpCodec {
    type Error = AmcpError;

    fn encode(&mut self, command: &str, dst: &mut BytesMut) -> Result<()> {
        if command.contains(['\r', '\n']) {
            return Err(AmcpError::InvalidCommand(command.to_string()));
        }
        dst.reserve(command.len() + CRLF.len());
        dst.put_slice(command.as_bytes());
        dst.put_slice(CRLF);
        Ok(())
    }
}
