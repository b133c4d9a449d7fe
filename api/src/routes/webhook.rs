use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::instrument;

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};

const EVENT_HEADER: &str = "X-GitHub-Event";
const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// `POST /webhook`: validates the signature, parses the
/// payload by `X-GitHub-Event`, and spawns the rest of the processing
/// with its own 120s deadline — so this handler itself returns as soon
/// as `handle_webhook` has finished the synchronous validate/parse/count
/// steps, giving the caller a prompt `200`.
#[instrument(name = "webhook_route", skip(state, headers, body))]
pub async fn webhook_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingEventType)?
        .to_string();

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    webhook_dispatch::handle_webhook(
        state.dispatch.clone(),
        event_type,
        signature,
        headers,
        body,
    )
    .await?;

    Ok(StatusCode::OK)
}
