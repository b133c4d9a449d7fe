//! axum HTTP surface: `POST /webhook`, `GET /metrics`,
//! `GET /live`, `GET /ready`. The only crate (besides the bin) that
//! knows about HTTP framing; everything it does is delegate into
//! `webhook_dispatch` after resolving shared process state.

pub mod core;
pub mod error_handler;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;
use tracing::info;

pub use core::app_state::{AppConfig, AppState};
pub use error_handler::{AppError, AppResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(routes::webhook::webhook_route))
        .route("/metrics", get(routes::metrics::metrics_route))
        .route("/live", get(routes::health::live_route))
        .route("/ready", get(routes::health::ready_route))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Builds the shared dispatcher context from the environment and starts
/// serving on `listen_addr` (port 8080 by default) with 10s read/write
/// timeouts.
pub async fn start() -> AppResult<()> {
    let config = AppConfig::from_env()?;

    let argocd = argocd_diff::HttpArgoCdClient::from_env()
        .map(|c| Arc::new(c) as Arc<dyn argocd_diff::ArgoCdClient>)
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "ARGOCD_SERVER_ADDR not usable, ArgoCD diffing will fail on first use");
            Arc::new(argocd_diff::HttpArgoCdClient::new(
                reqwest::Client::new(),
                String::new(),
                String::new(),
            ))
        });

    let forwarding_http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|err| AppError::Bind(std::io::Error::other(err)))?;

    let dispatch = Arc::new(webhook_dispatch::AppContext::new(
        argocd,
        forwarding_http,
        config.webhook_secret.clone().into_bytes(),
    ));
    let state = Arc::new(AppState { dispatch });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(AppError::Bind)?;
    info!(addr = %config.listen_addr, "telefonistka controller listening");

    axum::serve(listener, app)
        .await
        .map_err(AppError::Bind)?;

    Ok(())
}
