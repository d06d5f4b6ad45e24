//! `/metrics`, `/shutdown` and the banner fallback.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tracing::{error, warn};

use crate::api::server::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/shutdown", get(shutdown))
        .fallback(banner)
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.aggregator.render().await {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], body),
        Err(e) => {
            error!(error = %e, "Unable to get metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                format!("Unable to get metrics\n\n{}", e),
            )
        }
    }
}

async fn shutdown(State(state): State<AppState>) -> StatusCode {
    warn!("Shutdown requested");
    state.shutdown.cancel();
    StatusCode::OK
}

async fn banner(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        state.banner.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::config::{Selection, Settings};
    use crate::metrics::MetricsAggregator;

    fn state() -> AppState {
        let settings = Settings {
            disk_usage: Selection::Enabled(false),
            network_usage: Selection::Enabled(false),
            ..Default::default()
        };
        AppState {
            aggregator: Arc::new(MetricsAggregator::new(&settings, None)),
            shutdown: CancellationToken::new(),
            banner: Arc::from("nebula exporter"),
        }
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let (status, body) = get_body(create_router(state()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("nebula_uptime_seconds{"));
    }

    #[tokio::test]
    async fn test_unknown_path_serves_banner() {
        let (status, body) = get_body(create_router(state()), "/anything").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "nebula exporter");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let state = state();
        let token = state.shutdown.clone();
        let (status, body) = get_body(create_router(state), "/shutdown").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert!(token.is_cancelled());
    }
}
