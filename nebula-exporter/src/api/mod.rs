//! HTTP interface.

pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};

/// Text served for any path other than the API routes, and printed at startup.
pub fn banner(host: &str, port: u16) -> String {
    format!(
        "
Nebula Broadcast Prometheus exporter v{version}
https://nebulabroadcast.com

Listening on {host}:{port}

    - use /metrics for metrics
    - use /shutdown for shutdown (service, not machine)

",
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_mentions_endpoint() {
        let text = banner("0.0.0.0", 9731);
        assert!(text.contains("Listening on 0.0.0.0:9731"));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
    }
}
