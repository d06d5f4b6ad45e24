use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::connection::ConnectionManager;
use super::discovery::{Channel, discover_channels, negotiate_protocol};
use super::heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, spawn_heartbeat};
use super::listener::OscListener;
use super::protocol::ProtocolVersion;
use super::stage::LayerSnapshot;
use super::telemetry::Telemetry;
use crate::config::Settings;
use crate::error::Result;

/// Connection parameters of the CasparCG subsystem.
#[derive(Debug, Clone)]
pub struct CasparConfig {
    pub host: String,
    pub amcp_port: u16,
    pub osc_host: String,
    pub osc_port: u16,
    pub heartbeat_interval: Duration,
}

impl CasparConfig {
    /// `None` when no CasparCG host is configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings.caspar_host().map(|host| Self {
            host: host.to_string(),
            amcp_port: settings.amcp_port,
            osc_host: "0.0.0.0".to_string(),
            osc_port: settings.osc_port,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        })
    }
}

/// Live telemetry of one CasparCG server.
///
/// Created by [`CasparProvider::start`], which also spawns the heartbeat and
/// the OSC listener. Both stop when [`CasparProvider::shutdown`] is called or
/// the parent token is cancelled.
pub struct CasparProvider {
    host: String,
    protocol: ProtocolVersion,
    channels: BTreeMap<u32, Channel>,
    connection: Arc<ConnectionManager>,
    telemetry: Arc<Telemetry>,
    cancel: CancellationToken,
}

impl CasparProvider {
    /// Connect, negotiate, enumerate channels and start the background tasks.
    ///
    /// Returns `Ok(None)` if the subsystem is disabled. Only an unknown video
    /// mode is an error; an unreachable server leaves the heartbeat to
    /// reconnect later.
    pub async fn start(
        config: Option<CasparConfig>,
        parent: &CancellationToken,
    ) -> Result<Option<Arc<Self>>> {
        let Some(config) = config else {
            info!("No CasparCG host configured, CasparCG metrics disabled");
            return Ok(None);
        };

        info!(host = %config.host, port = config.amcp_port, "Connecting to CasparCG");
        let connection = Arc::new(ConnectionManager::new(&config.host, config.amcp_port));
        connection.connect().await;

        let protocol = negotiate_protocol(&connection).await;
        let channels = discover_channels(&connection).await?;

        let frame_rates = channels
            .values()
            .map(|channel| (channel.id, channel.frame_rate))
            .collect();
        let telemetry = Arc::new(Telemetry::new(frame_rates));
        let cancel = parent.child_token();

        spawn_heartbeat(
            Arc::clone(&connection),
            config.heartbeat_interval,
            cancel.clone(),
        );

        let osc_addr = format!("{}:{}", config.osc_host, config.osc_port);
        match OscListener::bind(&osc_addr, Arc::clone(&telemetry)).await {
            Ok(listener) => {
                listener.spawn(cancel.clone());
            }
            Err(e) => error!(addr = %osc_addr, error = %e, "Unable to bind OSC listener"),
        }

        debug!(channels = channels.len(), "CasparCG provider started");
        Ok(Some(Arc::new(Self {
            host: config.host,
            protocol,
            channels,
            connection,
            telemetry,
            cancel,
        })))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    pub fn channels(&self) -> &BTreeMap<u32, Channel> {
        &self.channels
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Seconds since the last OSC datagram.
    pub fn idle_seconds(&self) -> f64 {
        self.telemetry.idle_seconds()
    }

    /// Peak audio level of a channel since the previous call.
    pub fn take_peak_volume(&self, channel: u32) -> f64 {
        self.telemetry.peaks.take(channel)
    }

    /// (layer, dropped frames) pairs of a channel, ascending by layer.
    pub fn dropped_frames(&self, channel: u32) -> Vec<(u32, u64)> {
        self.telemetry.drops.layers_of(channel)
    }

    pub fn layer_snapshot(&self, channel: u32, layer: u32) -> LayerSnapshot {
        self.telemetry
            .stage
            .snapshot(channel, layer, self.telemetry.frame_rate(channel))
    }

    /// Stop the heartbeat and the OSC listener.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CasparProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for CasparProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasparProvider")
            .field("host", &self.host)
            .field("protocol", &self.protocol)
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
