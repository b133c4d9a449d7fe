use thiserror::Error;

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error(transparent)]
    RepoTree(#[from] repo_tree::RtError),

    #[error(transparent)]
    Config(#[from] promotion_config::ConfigError),
}
