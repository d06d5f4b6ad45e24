//! Liveness probe and reconnect loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::connection::ConnectionManager;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Probe command; cheap on every server version.
const PROBE_COMMAND: &str = "VERSION";

/// Spawn the heartbeat task.
///
/// Every `interval` the server is probed with `VERSION`; a failed probe
/// triggers a reconnect. The task only exits when `cancel` fires.
pub fn spawn_heartbeat(
    connection: Arc<ConnectionManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the connection was just
        // established by startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let response = connection.query(PROBE_COMMAND).await;
            if response.is_success() {
                trace!(host = connection.host(), "Heartbeat OK");
                continue;
            }

            warn!(
                host = connection.host(),
                response = %response,
                "CasparCG heartbeat failed, reconnecting"
            );
            if connection.connect().await {
                info!(host = connection.host(), "Reconnected to CasparCG");
            }
        }

        debug!(host = connection.host(), "Heartbeat stopped");
    })
}
