//! Application discovery: map a changed component path to
//! the ArgoCD `Application` object that renders it, in one of two modes.

use sha1::{Digest, Sha1};

use crate::client::ArgoCdClient;
use crate::errors::ArgoResult;
use crate::types::{Application, COMPONENT_PATH_SHA1_LABEL, MANIFEST_GENERATE_PATHS_ANNOTATION};

/// Label mode: `sha1(componentPath)` hex, filtered by repo.
pub async fn discover_by_label(
    client: &dyn ArgoCdClient,
    repo_url: &str,
    component_path: &str,
) -> ArgoResult<Option<Application>> {
    let mut hasher = Sha1::new();
    hasher.update(component_path.as_bytes());
    let hash = hex::encode(hasher.finalize());

    let candidates = client
        .list_applications_by_label(COMPONENT_PATH_SHA1_LABEL, &hash)
        .await?;

    Ok(candidates
        .into_iter()
        .find(|app| app.spec.source.repo_url == repo_url))
}

/// Annotation mode: scan every application in the repo and take the first
/// whose `manifest-generate-paths` annotation covers `component_path`.
pub async fn discover_by_annotation(
    client: &dyn ArgoCdClient,
    repo_url: &str,
    component_path: &str,
) -> ArgoResult<Option<Application>> {
    let apps = client.list_applications(Some(repo_url)).await?;

    for app in apps {
        let Some(raw) = app.metadata.annotations.get(MANIFEST_GENERATE_PATHS_ANNOTATION) else {
            continue;
        };
        let source_path = app.spec.source.path.clone().unwrap_or_default();

        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let resolved = resolve_entry(entry, &source_path);
            if contains_path(&resolved, component_path) {
                return Ok(Some(app));
            }
        }
    }

    Ok(None)
}

/// Entry point honoring `useSHALabelForAppDiscovery`.
pub async fn discover_app_for_component(
    client: &dyn ArgoCdClient,
    repo_url: &str,
    component_path: &str,
    use_sha_label: bool,
) -> ArgoResult<Option<Application>> {
    if use_sha_label {
        discover_by_label(client, repo_url, component_path).await
    } else {
        discover_by_annotation(client, repo_url, component_path).await
    }
}

/// Resolves one annotation entry to a repo-root-relative path. `.`-relative
/// entries (`.` or `./sub`) are joined against the application's own
/// `spec.source.path`; anything else is already repo-root-relative.
fn resolve_entry(entry: &str, source_path: &str) -> String {
    let source_path = source_path.trim_end_matches('/');
    if entry == "." {
        return source_path.to_string();
    }
    if let Some(rest) = entry.strip_prefix("./") {
        if source_path.is_empty() {
            return rest.trim_end_matches('/').to_string();
        }
        return format!("{source_path}/{}", rest.trim_end_matches('/'));
    }
    entry.trim_end_matches('/').to_string()
}

/// `filepath.Rel(base, target)` does not escape with `..` iff `target`
/// is `base` itself or lives underneath it.
fn contains_path(base: &str, target: &str) -> bool {
    let base = base.trim_end_matches('/');
    let target = target.trim_end_matches('/');
    if base.is_empty() {
        return true;
    }
    target == base || target.starts_with(&format!("{base}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_relative_entry_resolves_against_source_path() {
        assert_eq!(resolve_entry(".", "workspace/foo"), "workspace/foo");
        assert_eq!(
            resolve_entry("./charts", "workspace/foo"),
            "workspace/foo/charts"
        );
    }

    #[test]
    fn absolute_entry_is_used_as_is() {
        assert_eq!(
            resolve_entry("workspace/foo", "env/staging/c1"),
            "workspace/foo"
        );
    }

    #[test]
    fn containment_requires_prefix_boundary() {
        assert!(contains_path("workspace/foo", "workspace/foo"));
        assert!(contains_path("workspace/foo", "workspace/foo/nested"));
        assert!(!contains_path("workspace/foo", "workspace/foobar"));
    }
}
