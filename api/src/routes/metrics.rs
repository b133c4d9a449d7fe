use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, TextEncoder};
use tracing::error;

/// `GET /metrics`: renders the process-wide default
/// Prometheus registry as text, the ecosystem equivalent of the
/// original's `promhttp.Handler()`. Every gauge/counter registered by
/// `gh_core::metrics`, `webhook_dispatch::metrics`, and `argocd_diff`
/// lives in this same default registry (`prometheus::default_registry`).
pub async fn metrics_route() -> Response {
    let metric_families = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(%err, "failed to encode prometheus metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
