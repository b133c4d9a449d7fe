//! Promotion-plan data model.

use std::collections::HashMap;

use serde::Serialize;

/// `{sourcePath, componentName, autoMerge}` — uniqueness is set semantics,
/// hence `Hash`/`Eq` on all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelevantComponent {
    pub source_path: String,
    pub component_name: String,
    pub auto_merge: bool,
}

/// One promotion instance's metadata, aggregated across every component
/// that shares the same `(sourcePath, sorted targetPaths)` key (I2).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromotionInstanceMetadata {
    pub source_path: String,
    pub target_paths: Vec<String>,
    pub target_description: String,
    /// component name -> target paths skipped for that component (I3).
    pub per_component_skipped_target_paths: HashMap<String, Vec<String>>,
    pub component_names: Vec<String>,
    pub auto_merge: bool,
}

/// One promotion instance: its metadata plus the computed sync map.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromotionInstance {
    pub metadata: PromotionInstanceMetadata,
    /// `targetPath+componentName -> sourcePath+componentName` (I3).
    pub computed_sync_paths: HashMap<String, String>,
}

/// Aggregation key -> promotion instance, keyed by
/// `sourcePath + ">" + join(sorted(targetPaths), "|")`.
pub type Plan = HashMap<String, PromotionInstance>;

pub fn aggregation_key(source_path: &str, sorted_target_paths: &[String]) -> String {
    format!("{source_path}>{}", sorted_target_paths.join("|"))
}
