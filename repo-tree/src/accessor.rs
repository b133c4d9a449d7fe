//! Read-only Git-object helpers over the REST "contents" API.
//!
//! All four operations are pure functions of `(client, owner, repo, git_ref,
//! path)`; callers thread the ref explicitly rather than through a shared
//! context so drift detection can compare two different refs at once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use gh_core::RestClient;
use tracing::warn;

use crate::errors::RtResult;
use crate::types::{ContentsEntry, TreeEntry, is_dir, is_file};

/// `fetch-file-content`: returns the decoded text and HTTP status, or
/// `None` if the path doesn't exist at `git_ref`.
pub async fn fetch_file_content(
    client: &RestClient,
    owner: &str,
    repo: &str,
    git_ref: &str,
    path: &str,
) -> RtResult<Option<(String, u16)>> {
    let api_path = format!("/repos/{owner}/{repo}/contents/{path}");
    let raw = client
        .get_raw(&api_path, &[("ref", git_ref)])
        .await?;

    match raw {
        None => Ok(None),
        Some((status, bytes)) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok(Some((text, status)))
        }
    }
}

/// `fetch-directory-object-hash`: the contents API never reports a
/// directory's own blob hash when queried directly, so list the parent
/// and find the matching child entry instead.
pub async fn fetch_directory_object_hash(
    client: &RestClient,
    owner: &str,
    repo: &str,
    git_ref: &str,
    dir_path: &str,
) -> RtResult<String> {
    let trimmed = dir_path.trim_end_matches('/');
    let (parent, _name) = match trimmed.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", trimmed),
    };

    let listing = list_dir(client, owner, repo, git_ref, parent).await?;
    let Some(entries) = listing else {
        return Ok(String::new());
    };

    Ok(entries
        .into_iter()
        .find(|e| e.path == trimmed)
        .map(|e| e.sha)
        .unwrap_or_default())
}

/// `flat-map-file-tree`: depth-first recursion over `root`, producing a
/// `relative-path -> blob-hash` map. Entries that are neither files nor
/// directories (symlinks, submodules) are skipped with a warning.
pub fn flat_map_file_tree<'a>(
    client: &'a RestClient,
    owner: &'a str,
    repo: &'a str,
    git_ref: &'a str,
    root: &'a str,
) -> Pin<Box<dyn Future<Output = RtResult<HashMap<String, String>>> + Send + 'a>> {
    Box::pin(async move {
        let mut out = HashMap::new();
        let root_trimmed = root.trim_end_matches('/');
        let Some(entries) = list_dir(client, owner, repo, git_ref, root_trimmed).await? else {
            return Ok(out);
        };

        for entry in entries {
            if is_file(&entry) {
                let relative = relative_to(root_trimmed, &entry.path);
                out.insert(relative, entry.sha);
            } else if is_dir(&entry) {
                let sub =
                    flat_map_file_tree(client, owner, repo, git_ref, &entry.path).await?;
                out.extend(sub);
            } else {
                warn!(path = %entry.path, kind = %entry.kind, "ignoring non file/dir tree entry");
            }
        }

        Ok(out)
    })
}

/// `generate-deletion-tree-entries`: recursively enumerates every file
/// beneath `path` and emits a `sha=null` blob entry for it — the only way
/// the low-level tree API expresses "remove this file", since subtree
/// substitution otherwise merges rather than replaces.
pub fn generate_deletion_tree_entries<'a>(
    client: &'a RestClient,
    owner: &'a str,
    repo: &'a str,
    git_ref: &'a str,
    path: &'a str,
) -> Pin<Box<dyn Future<Output = RtResult<Vec<TreeEntry>>> + Send + 'a>> {
    Box::pin(async move {
        let mut out = Vec::new();
        let trimmed = path.trim_end_matches('/');
        let Some(entries) = list_dir(client, owner, repo, git_ref, trimmed).await? else {
            return Ok(out);
        };

        for entry in entries {
            if is_file(&entry) {
                out.push(TreeEntry::delete_blob(entry.path));
            } else if is_dir(&entry) {
                let nested =
                    generate_deletion_tree_entries(client, owner, repo, git_ref, &entry.path)
                        .await?;
                out.extend(nested);
            }
        }

        Ok(out)
    })
}

/// Lists one directory's immediate entries, or `None` on 404.
async fn list_dir(
    client: &RestClient,
    owner: &str,
    repo: &str,
    git_ref: &str,
    path: &str,
) -> RtResult<Option<Vec<ContentsEntry>>> {
    let api_path = if path.is_empty() {
        format!("/repos/{owner}/{repo}/contents")
    } else {
        format!("/repos/{owner}/{repo}/contents/{path}")
    };
    let entries = client
        .get_json_query::<Vec<ContentsEntry>>(&api_path, &[("ref", git_ref)])
        .await?;
    Ok(entries)
}

fn relative_to(root: &str, full_path: &str) -> String {
    if root.is_empty() {
        return full_path.to_string();
    }
    full_path
        .strip_prefix(root)
        .and_then(|s| s.strip_prefix('/'))
        .unwrap_or(full_path)
        .to_string()
}
