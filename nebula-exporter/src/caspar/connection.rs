//! AMCP control connection.

use std::time::Duration;

use amcp::{AmcpCodec, AmcpResponse};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Return code used for locally generated failures.
const LOCAL_FAILURE_CODE: u16 = 500;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

type Transport = Framed<TcpStream, AmcpCodec>;

/// Owns the single AMCP connection to a CasparCG server.
///
/// Queries are serialized by the transport lock, so a response is always
/// matched to the command that produced it.
pub struct ConnectionManager {
    host: String,
    port: u16,
    transport: Mutex<Option<Transport>>,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            transport: Mutex::new(None),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, query_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.query_timeout = query_timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    /// (Re)connect, replacing any existing transport.
    ///
    /// Returns whether the connection is up afterwards.
    pub async fn connect(&self) -> bool {
        let mut transport = self.transport.lock().await;
        // Never leave a stale stream in place while dialing.
        transport.take();

        let address = format!("{}:{}", self.host, self.port);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%address, error = %e, "Failed to set TCP_NODELAY");
                }
                *transport = Some(Framed::new(stream, AmcpCodec::new()));
                info!(%address, "Connected to CasparCG");
                true
            }
            Ok(Err(e)) => {
                warn!(%address, error = %e, "Unable to connect to CasparCG");
                false
            }
            Err(_) => {
                warn!(
                    %address,
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Timed out connecting to CasparCG"
                );
                false
            }
        }
    }

    /// Send one command and wait for its response.
    ///
    /// Never fails: transport problems come back as a failure response and
    /// drop the connection so subsequent queries fail fast until the next
    /// successful [`connect`](Self::connect).
    pub async fn query(&self, command: &str) -> AmcpResponse {
        let mut guard = self.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            return AmcpResponse::failure(LOCAL_FAILURE_CODE, "Not connected");
        };

        let outcome = tokio::time::timeout(self.query_timeout, async {
            transport.send(command).await?;
            match transport.next().await {
                Some(result) => result.map(Some),
                None => Ok(None),
            }
        })
        .await;

        let failure = match outcome {
            Ok(Ok(Some(response))) => {
                debug!(command, code = response.code, "AMCP response");
                return response;
            }
            Ok(Ok(None)) => "Connection closed by server".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("No response within {:?}", self.query_timeout),
        };

        warn!(command, error = %failure, "AMCP query failed, dropping connection");
        guard.take();
        AmcpResponse::failure(LOCAL_FAILURE_CODE, failure)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
