//! HTTP server setup.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultOnResponse, MakeSpan, OnResponse, TraceLayer};
use tracing::{Level, Span};

use crate::api::routes;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::metrics::MetricsAggregator;

/// HTTP bind configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl ApiServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bind_address: settings.bind_address().to_string(),
            port: settings.port,
        }
    }

    /// Host part usable for resolution; `[::]` style brackets are removed.
    fn host(&self) -> &str {
        let host = self.bind_address.trim();
        host.strip_prefix('[')
            .and_then(|host| host.strip_suffix(']'))
            .unwrap_or(host)
    }

    /// Bind a listener. The host may be an IPv4 or IPv6 literal or a name
    /// resolved by the system (`localhost`).
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind((self.host(), self.port))
            .await
            .map_err(|e| {
                Error::ApiError(format!(
                    "Unable to bind {}:{}: {}",
                    self.bind_address, self.port, e
                ))
            })
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<MetricsAggregator>,
    /// Cancelled by `/shutdown`
    pub shutdown: CancellationToken,
    pub banner: Arc<str>,
}

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// The server stops when `cancel_token` is cancelled, including through
    /// the `/shutdown` route.
    pub fn new(
        config: ApiServerConfig,
        aggregator: Arc<MetricsAggregator>,
        banner: impl Into<Arc<str>>,
        cancel_token: CancellationToken,
    ) -> Self {
        let state = AppState {
            aggregator,
            shutdown: cancel_token.clone(),
            banner: banner.into(),
        };
        Self {
            config,
            state,
            cancel_token,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let mut make_span = tower_http::trace::DefaultMakeSpan::new().level(Level::DEBUG);
                    make_span.make_span(req)
                })
                .on_response(|res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    DefaultOnResponse::new()
                        .level(Level::DEBUG)
                        .on_response(res, latency, span);
                }),
        )
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn run(&self) -> Result<()> {
        let listener = self.config.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!("HTTP server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| Error::ApiError(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
