use thiserror::Error;

pub type DriftResult<T> = Result<T, DriftError>;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error(transparent)]
    RepoTree(#[from] repo_tree::RtError),

    #[error(transparent)]
    Synth(#[from] commit_synthesizer::SynthError),
}
