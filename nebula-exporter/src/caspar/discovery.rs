//! Protocol negotiation and channel enumeration.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, info, warn};

use super::connection::ConnectionManager;
use super::protocol::{FrameRate, ProtocolVersion, frame_rate_for_mode};
use crate::error::{Error, Result};

/// A discovered playout channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: u32,
    pub video_mode: String,
    pub frame_rate: FrameRate,
}

/// Ask the server for its version and map it onto a protocol generation.
///
/// A failed or empty `VERSION` answer falls back like an unknown version.
pub async fn negotiate_protocol(connection: &ConnectionManager) -> ProtocolVersion {
    let response = connection.query("VERSION").await;
    let version = match response.first_line() {
        Some(line) if response.is_success() => line.trim().to_string(),
        _ => {
            warn!(host = connection.host(), response = %response, "VERSION query failed");
            String::new()
        }
    };

    let protocol = ProtocolVersion::resolve(&version);
    info!(
        host = connection.host(),
        server_version = %version,
        protocol = %protocol,
        "Negotiated AMCP protocol"
    );
    protocol
}

/// Enumeration gives up after this many channels in a row without a video
/// mode.
pub const MAX_CONSECUTIVE_SKIPS: u32 = 4;

/// Enumerate channels with `INFO 1`, `INFO 2`, ... until a query fails.
///
/// Channels whose INFO document carries no video mode are skipped, up to
/// [`MAX_CONSECUTIVE_SKIPS`] in a row. An unrecognised video mode aborts
/// discovery.
pub async fn discover_channels(connection: &ConnectionManager) -> Result<BTreeMap<u32, Channel>> {
    let mut channels = BTreeMap::new();
    let mut skipped = 0;

    for id in 1u32.. {
        let response = connection.query(&format!("INFO {}", id)).await;
        if !response.is_success() {
            debug!(channel = id, response = %response, "Channel enumeration finished");
            break;
        }

        let Some(mode) = extract_video_mode(&response.payload()) else {
            skipped += 1;
            if skipped >= MAX_CONSECUTIVE_SKIPS {
                warn!(
                    channel = id,
                    skipped,
                    "No video mode in consecutive INFO responses, stopping enumeration"
                );
                break;
            }
            warn!(channel = id, "INFO response has no video mode, skipping channel");
            continue;
        };
        skipped = 0;

        let frame_rate =
            frame_rate_for_mode(&mode).ok_or_else(|| Error::unknown_video_mode(id, &mode))?;

        info!(channel = id, video_mode = %mode, frame_rate = %frame_rate, "Discovered channel");
        channels.insert(
            id,
            Channel {
                id,
                video_mode: mode,
                frame_rate,
            },
        );
    }

    Ok(channels)
}

/// Text of the first `video-mode` element, or `None` if there is none or the
/// document is not well formed.
pub fn extract_video_mode(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => inside = e.name().as_ref() == b"video-mode",
            Ok(Event::Text(text)) if inside => {
                let mode = text.unescape().ok()?.trim().to_string();
                return (!mode.is_empty()).then_some(mode);
            }
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Malformed INFO document");
                return None;
            }
        }
    }
}
