use thiserror::Error;

pub type SynthResult<T> = Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error(transparent)]
    RepoTree(#[from] repo_tree::RtError),

    #[error("could not resolve 'heads/{0}' ref")]
    RefNotFound(String),
}
