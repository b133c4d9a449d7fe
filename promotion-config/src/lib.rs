//! Root and per-component configuration loading: YAML parsing plus
//! one-time regex compilation, shared by the promotion planner, drift
//! comparator, and ArgoCD orchestrator.

pub mod compiled;
pub mod errors;
pub mod loader;
pub mod raw;

pub use compiled::{
    CompiledPromotionPath, CompiledPromotionPr, CompiledWebhookEndpoint, ComponentOverlay, Config,
};
pub use errors::{ConfigError, ConfigResult};
pub use loader::{component_overlay_path, parse_component_overlay, parse_root_config};
