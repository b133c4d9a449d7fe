use thiserror::Error;

pub type RtResult<T> = Result<T, RtError>;

#[derive(Debug, Error)]
pub enum RtError {
    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error("path '{0}' is not valid utf-8 file content")]
    InvalidUtf8(String),
}
