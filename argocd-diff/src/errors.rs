//! Crate-wide error hierarchy for the ArgoCD diff orchestrator.

use thiserror::Error;

pub type ArgoResult<T> = Result<T, ArgoError>;

#[derive(Debug, Error)]
pub enum ArgoError {
    #[error("argocd unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("argocd api error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error(transparent)]
    Synth(#[from] commit_synthesizer::SynthError),

    #[error("failed to render application-set template: {0}")]
    Template(String),

    #[error("failed to decode manifest yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
