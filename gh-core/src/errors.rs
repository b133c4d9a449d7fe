//! Crate-wide error hierarchy for gh-core.

use thiserror::Error;

pub type GhResult<T> = Result<T, GhError>;

/// Root error type for GitHub client construction and low-level calls.
#[derive(Debug, Error)]
pub enum GhError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("failed to read GitHub App private key at {path}: {source}")]
    PrivateKey {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to mint installation JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("no installation found for owner '{0}'")]
    InstallationNotFound(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("github api error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    #[error("graphql error: {0}")]
    GraphQl(String),

    #[error("failed to decode json: {0}")]
    Json(#[from] serde_json::Error),
}

impl GhError {
    /// True only for the one narrow, fragile-but-intentional class of
    /// error: a 405 whose body mentions trying the merge again — not
    /// broadened to other 4xx/5xx/transport errors, which would mask
    /// real merge conflicts.
    pub fn is_retryable_merge_error(&self) -> bool {
        match self {
            GhError::Api { status, body } => *status == 405 && body.contains("try the merge again"),
            _ => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            GhError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
