//! Process-wide configuration and shared handler state.
//!
//! `AppConfig` is parsed once at startup from the environment, as a typed
//! struct rather than scattered inline `std::env::var` lookups, since
//! this controller reads many variables across several subsystems.

use std::sync::Arc;

use thiserror::Error;
use webhook_dispatch::AppContext;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),
}

/// Every environment variable this controller reads, resolved once at boot.
/// The app-vs-token choice for GitHub auth, and the ArgoCD endpoint, are
/// validated lazily by `gh_core::ClientRegistry` / `argocd_diff` on
/// first use rather than eagerly here, since they differ per identity
/// and aren't needed until a webhook actually exercises them.
pub struct AppConfig {
    pub webhook_secret: String,
    pub templates_path: String,
    pub listen_addr: String,
}

const DEFAULT_TEMPLATES_PATH: &str = "templates/";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = std::env::var("GITHUB_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::MissingEnv("GITHUB_WEBHOOK_SECRET"))?;

        Ok(Self {
            webhook_secret,
            templates_path: std::env::var("TEMPLATES_PATH")
                .unwrap_or_else(|_| DEFAULT_TEMPLATES_PATH.to_string()),
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
        })
    }
}

/// Shared axum handler state: one dispatcher context for the whole
/// process.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<AppContext>,
}
