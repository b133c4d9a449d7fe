//! ArgoCD-facing data model: application manifests,
//! managed resources and the diff records rendered into PR comments.
//!
//! Field shapes follow ArgoCD's own `Application` CRD, kept to the
//! subset this controller actually reads or writes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const MANIFEST_GENERATE_PATHS_ANNOTATION: &str = "argocd.argoproj.io/manifest-generate-paths";
pub const COMPONENT_PATH_SHA1_LABEL: &str = "telefonistka.io/component-path-sha1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSource {
    #[serde(rename = "repoURL", default)]
    pub repo_url: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "targetRevision", default)]
    pub target_revision: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSpec {
    pub source: AppSource,
    #[serde(rename = "syncPolicy", default)]
    pub sync_policy: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Application {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: AppMetadata,
    pub spec: AppSpec,
    /// URL to the application's page in the ArgoCD UI, when known. Not part
    /// of the CRD itself — populated by the client from the instance's base
    /// URL when rendering PR comments.
    #[serde(skip)]
    pub ui_url: Option<String>,
}

fn default_api_version() -> String {
    "argoproj.io/v1alpha1".to_string()
}

fn default_kind() -> String {
    "Application".to_string()
}

/// One generator entry of an ApplicationSet's git directory generator,
/// e.g. `clusters/*/*/*`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitDirectoryGenerator {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSetGenerator {
    #[serde(default)]
    pub git: Option<GitGenerator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitGenerator {
    #[serde(default)]
    pub directories: Vec<GitDirectoryGenerator>,
    #[serde(rename = "repoURL", default)]
    pub repo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSetSpec {
    #[serde(default)]
    pub generators: Vec<ApplicationSetGenerator>,
    pub template: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSet {
    pub metadata: AppMetadata,
    pub spec: ApplicationSetSpec,
}

/// One Kubernetes object ArgoCD manages under an application: the live
/// (cluster) state as returned by `managed-resources`.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagedResource {
    pub group: String,
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    /// `null` when the object exists only in the desired manifests (not yet
    /// applied) or only live (about to be pruned).
    #[serde(default)]
    pub normalized_live_state: Option<String>,
    #[serde(default)]
    pub target_state: Option<String>,
}

/// `{group, kind, namespace, name, diffText}`.
#[derive(Debug, Clone, Serialize)]
pub struct DiffElement {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub diff_text: String,
}

/// `{componentPath, appName, appURL, diffElements[], hasDiff, diffError,
/// appWasTemporarilyCreated, appSyncedFromPRBranch}`.
#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    pub component_path: String,
    pub app_name: Option<String>,
    pub app_url: Option<String>,
    pub diff_elements: Vec<DiffElement>,
    pub has_diff: bool,
    pub diff_error: Option<String>,
    pub app_was_temporarily_created: bool,
    pub app_synced_from_pr_branch: bool,
}

impl DiffResult {
    pub fn skipped(component_path: &str, reason: impl Into<String>) -> Self {
        Self {
            component_path: component_path.to_string(),
            app_name: None,
            app_url: None,
            diff_elements: Vec::new(),
            has_diff: false,
            diff_error: Some(reason.into()),
            app_was_temporarily_created: false,
            app_synced_from_pr_branch: false,
        }
    }
}
