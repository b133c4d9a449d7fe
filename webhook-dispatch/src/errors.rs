//! Error hierarchy for the event dispatcher and webhook multiplexer.

use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook signature validation failed")]
    SignatureInvalid,

    #[error("unrecognized X-GitHub-Event header value: {0}")]
    UnknownEventType(String),

    #[error("failed to parse webhook payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error(transparent)]
    RepoTree(#[from] repo_tree::RtError),

    #[error(transparent)]
    Config(#[from] promotion_config::ConfigError),

    #[error(transparent)]
    Planner(#[from] promotion_planner::PlannerError),

    #[error(transparent)]
    Synth(#[from] commit_synthesizer::SynthError),

    #[error(transparent)]
    Drift(#[from] drift_detector::DriftError),

    #[error(transparent)]
    Argo(#[from] argocd_diff::ArgoError),

    #[error("request exceeded its per-event deadline")]
    Timeout,
}
