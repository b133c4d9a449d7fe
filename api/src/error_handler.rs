use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::core::app_state::ConfigError;

/// Public application error type: a status/code/message triad mapped
/// through a single `IntoResponse` impl, covering this controller's HTTP
/// surface failure modes — webhook signature validation, payload parsing,
/// and boot-time config.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("webhook signature validation failed")]
    SignatureInvalid,

    #[error("missing X-GitHub-Event header")]
    MissingEventType,

    #[error("failed to parse webhook payload: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Bind(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            AppError::MissingEventType | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::SignatureInvalid => "SIGNATURE_INVALID",
            AppError::MissingEventType => "MISSING_EVENT_TYPE",
            AppError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<webhook_dispatch::DispatchError> for AppError {
    fn from(err: webhook_dispatch::DispatchError) -> Self {
        match err {
            webhook_dispatch::DispatchError::SignatureInvalid => AppError::SignatureInvalid,
            webhook_dispatch::DispatchError::UnknownEventType(_)
            | webhook_dispatch::DispatchError::Parse(_) => AppError::BadRequest(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}
