use thiserror::Error;

pub type BumpResult<T> = Result<T, BumpError>;

#[derive(Debug, Error)]
pub enum BumpError {
    #[error(transparent)]
    Gh(#[from] gh_core::GhError),

    #[error(transparent)]
    RepoTree(#[from] repo_tree::RtError),

    #[error(transparent)]
    Synth(#[from] commit_synthesizer::SynthError),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("yaml address '{0}' does not resolve to an existing scalar or map key")]
    YamlAddressNotFound(String),

    #[error("'{0}' is not an owner/repo slug")]
    InvalidRepoSlug(String),
}
