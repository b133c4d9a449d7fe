use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Distinguishes an absent config file (handled by the caller, treated as
/// empty/defaults) from an invalid one (always a hard
/// `ConfigError::Yaml`/`Regex`).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
