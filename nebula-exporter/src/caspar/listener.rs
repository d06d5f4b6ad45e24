//! OSC receiver and address dispatch.

use std::net::SocketAddr;
use std::sync::Arc;

use osc::{OscMessage, OscValue, decode_packet};
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stage::keys;
use super::telemetry::Telemetry;

/// Largest datagram accepted; CasparCG bundles stay well below this.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Stage,
    FrameRate,
    AudioLevel,
    ConsumeTime,
}

/// Matched in order, first hit wins.
///
/// `*` is one numeric segment, `**` is one or more trailing segments.
const ROUTES: &[(&str, Route)] = &[
    ("/channel/*/stage/layer/*/**", Route::Stage),
    ("/channel/*/framerate", Route::FrameRate),
    ("/channel/*/mixer/audio/**", Route::AudioLevel),
    ("/channel/*/output/consume_time", Route::ConsumeTime),
];

/// Captures of a successful route match.
#[derive(Debug, Default, PartialEq, Eq)]
struct Captures {
    ids: Vec<u32>,
    rest: Option<String>,
}

fn match_pattern(pattern: &str, address: &str) -> Option<Captures> {
    let segments: Vec<&str> = address.split('/').collect();
    let mut captures = Captures::default();

    for (i, part) in pattern.split('/').enumerate() {
        match part {
            "**" => {
                let rest = segments.get(i..).filter(|rest| {
                    !rest.is_empty() && rest.iter().all(|segment| !segment.is_empty())
                })?;
                captures.rest = Some(rest.join("/"));
                return Some(captures);
            }
            "*" => captures.ids.push(segments.get(i)?.parse().ok()?),
            literal => {
                if segments.get(i) != Some(&literal) {
                    return None;
                }
            }
        }
    }

    (segments.len() == pattern.split('/').count()).then_some(captures)
}

fn route(address: &str) -> Option<(Route, Captures)> {
    ROUTES
        .iter()
        .find_map(|(pattern, route)| match_pattern(pattern, address).map(|c| (*route, c)))
}

/// Apply one message to the telemetry state. Unrouted addresses are ignored.
pub fn dispatch(telemetry: &Telemetry, message: &OscMessage) {
    let Some((route, captures)) = route(&message.addr) else {
        return;
    };
    let channel = captures.ids[0];

    match route {
        Route::Stage => {
            let layer = captures.ids[1];
            let key = captures.rest.as_deref().unwrap_or_default();
            handle_stage(telemetry, channel, layer, key, &message.args);
        }
        Route::FrameRate => handle_frame_rate(telemetry, channel, &message.args),
        Route::AudioLevel => {
            handle_audio_level(telemetry, channel, captures.rest.as_deref(), &message.args)
        }
        Route::ConsumeTime => handle_consume_time(telemetry, channel, &message.args),
    }
}

fn handle_stage(telemetry: &Telemetry, channel: u32, layer: u32, key: &str, args: &[OscValue]) {
    telemetry.stage.update(channel, layer, key, args);

    if key != keys::PROFILER_TIME {
        return;
    }
    let Some(actual) = args.first().and_then(OscValue::as_f64) else {
        return;
    };

    let frame_rate = telemetry.frame_rate(channel);
    if frame_rate.exceeds_frame(actual) {
        let total = telemetry.drops.increment(channel, layer);
        warn!(
            channel,
            layer,
            actual,
            expected = frame_rate.frame_duration(),
            total,
            "Dropped frame detected"
        );
    }
}

fn handle_frame_rate(telemetry: &Telemetry, channel: u32, args: &[OscValue]) {
    let [num, den, ..] = args else {
        return;
    };
    let (Some(num), Some(den)) = (num.as_f64(), den.as_f64()) else {
        return;
    };

    if telemetry.report_frame_rate(channel, (num, den)) {
        info!(channel, num, den, "Channel frame rate reported");
    }
}

fn handle_audio_level(telemetry: &Telemetry, channel: u32, rest: Option<&str>, args: &[OscValue]) {
    // Only `<audio channel>/pFS`; other level keys are ignored.
    let Some((index, "pFS")) = rest.and_then(|rest| rest.split_once('/')) else {
        return;
    };
    if index.parse::<u32>().is_err() {
        return;
    }

    if let Some(level) = args.first().and_then(OscValue::as_f64) {
        telemetry.peaks.record(channel, level);
    }
}

fn handle_consume_time(telemetry: &Telemetry, channel: u32, args: &[OscValue]) {
    let Some(consume_time) = args.first().and_then(OscValue::as_f64) else {
        return;
    };

    let frame_rate = telemetry.frame_rate(channel);
    if frame_rate.exceeds_frame(consume_time) {
        warn!(
            channel,
            consume_time,
            frame_duration = frame_rate.frame_duration(),
            "Output consume time exceeds frame duration"
        );
    }
}

/// UDP receiver for the CasparCG OSC stream.
pub struct OscListener {
    socket: UdpSocket,
    telemetry: Arc<Telemetry>,
}

impl OscListener {
    pub async fn bind(addr: impl ToSocketAddrs, telemetry: Arc<Telemetry>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket, telemetry })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Receive and dispatch until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        if let Ok(addr) = self.socket.local_addr() {
            info!(%addr, "Listening for CasparCG OSC messages");
        }

        loop {
            let (len, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "OSC receive failed");
                        continue;
                    }
                },
            };

            self.telemetry.touch();
            match decode_packet(&buf[..len]) {
                Ok(packet) => {
                    for message in packet.into_messages() {
                        dispatch(&self.telemetry, &message);
                    }
                }
                Err(e) => debug!(%peer, len, error = %e, "Discarding undecodable OSC datagram"),
            }
        }

        debug!("OSC listener stopped");
    }
}
