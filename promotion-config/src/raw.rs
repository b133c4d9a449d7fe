//! Deserialization shapes, straight off the YAML. Patterns stay `String`
//! here; `compile` turns them into the `regex::Regex` the rest of the
//! controller actually matches against (see [`crate::compiled`]).

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    #[serde(default)]
    pub pr_has_labels: Vec<String>,
    #[serde(default)]
    pub auto_merge: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPr {
    pub target_paths: Vec<String>,
    #[serde(default)]
    pub target_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPath {
    pub source_path: String,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub component_path_extra_depth: u32,
    #[serde(default)]
    pub promotion_prs: Vec<PromotionPr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEndpointRegex {
    pub expression: String,
    #[serde(default)]
    pub replacements: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCdConfig {
    #[serde(default)]
    pub comment_diff_on_pr: bool,
    #[serde(default)]
    pub auto_merge_no_diff_prs: bool,
    #[serde(default)]
    pub allow_sync_from_branch_path_regex: Option<String>,
    #[serde(default)]
    pub use_sha_label_for_app_discovery: bool,
    #[serde(default)]
    pub create_temp_app_object_from_new_apps: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    #[serde(default)]
    pub promotion_paths: Vec<PromotionPath>,
    #[serde(default)]
    pub promotion_pr_labels: Vec<String>,
    #[serde(default)]
    pub dry_run_mode: bool,
    #[serde(default)]
    pub auto_approve_promotion_prs: bool,
    #[serde(default)]
    pub toggle_commit_status: HashMap<String, String>,
    #[serde(default)]
    pub webhook_endpoint_regexs: Vec<WebhookEndpointRegex>,
    #[serde(default)]
    pub argocd: ArgoCdConfig,
}

/// Per-component overlay at `<component>/telefonistka.yaml`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawComponentOverlay {
    #[serde(default)]
    pub promotion_target_allow_list: Vec<String>,
    #[serde(default)]
    pub promotion_target_block_list: Vec<String>,
    #[serde(default)]
    pub disable_argocd_diff: bool,
}
