use crate::compiled::{ComponentOverlay, Config};
use crate::errors::ConfigResult;
use crate::raw::{RawComponentOverlay, RawConfig};

pub const ROOT_CONFIG_PATH: &str = ".github/telefonistka.yaml";
pub const COMPONENT_OVERLAY_FILENAME: &str = "telefonistka.yaml";

/// Parses the root configuration. A missing file (404, represented by
/// `text = None` upstream) is the caller's concern — this function only
/// ever sees bytes that exist, and always returns either a compiled
/// config or a `ConfigError::Yaml`/`Regex`.
pub fn parse_root_config(yaml: &str) -> ConfigResult<Config> {
    let raw: RawConfig = serde_yaml::from_str(yaml)?;
    Config::compile(raw)
}

/// Parses a per-component overlay file.
pub fn parse_component_overlay(yaml: &str) -> ConfigResult<ComponentOverlay> {
    let raw: RawComponentOverlay = serde_yaml::from_str(yaml)?;
    ComponentOverlay::compile(raw)
}

/// The path an overlay lives at for a given component, e.g.
/// `workspace/team-a/telefonistka.yaml` for component `team-a/` under
/// source path `workspace/`.
pub fn component_overlay_path(source_path: &str, component_name: &str) -> String {
    format!(
        "{}{}/{COMPONENT_OVERLAY_FILENAME}",
        source_path.trim_end_matches('/'),
        if component_name.is_empty() {
            String::new()
        } else {
            format!("/{component_name}")
        }
    )
}
