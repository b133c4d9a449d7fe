use axum::http::StatusCode;

/// `GET /live`: process is up and serving requests.
pub async fn live_route() -> StatusCode {
    StatusCode::OK
}

/// `GET /ready`: identical to `/live` today — the
/// controller holds no connection pools or caches that need warming
/// before it can safely accept webhooks; both probes exist because the
/// original exposes both and downstream Kubernetes manifests probe them
/// independently.
pub async fn ready_route() -> StatusCode {
    StatusCode::OK
}
