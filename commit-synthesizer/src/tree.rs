//! Tree-entry mutation builder.
//!
//! The subtlest invariant of the synthesizer: subtree substitution via the
//! low-level Git tree API *merges* the new subtree over the old one rather
//! than replacing it, so any file present in the target but absent from the
//! source must get an explicit `sha=null` deletion entry or it survives the
//! promotion unintentionally.

use repo_tree::{TreeEntry, fetch_directory_object_hash, flat_map_file_tree, generate_deletion_tree_entries};

use crate::errors::SynthResult;

/// Builds every tree entry needed to sync one `target <- source` pair.
pub async fn tree_entries_for_pair(
    rest: &gh_core::RestClient,
    owner: &str,
    repo: &str,
    default_branch: &str,
    source_path: &str,
    target_path: &str,
) -> SynthResult<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    let source_hash =
        fetch_directory_object_hash(rest, owner, repo, default_branch, source_path).await?;

    if source_hash.is_empty() {
        // The source directory is gone — the triggering PR deleted it.
        // Replicate the deletion on the target instead of swapping subtrees.
        let deletions =
            generate_deletion_tree_entries(rest, owner, repo, default_branch, target_path).await?;
        entries.extend(deletions);
        return Ok(entries);
    }

    entries.push(TreeEntry::subtree(
        target_path.trim_end_matches('/'),
        source_hash,
    ));

    let source_files =
        flat_map_file_tree(rest, owner, repo, default_branch, source_path).await?;
    let target_files =
        flat_map_file_tree(rest, owner, repo, default_branch, target_path).await?;

    let target_trimmed = target_path.trim_end_matches('/');
    for relative_path in target_files.keys() {
        if !source_files.contains_key(relative_path) {
            entries.push(TreeEntry::delete_blob(format!(
                "{target_trimmed}/{relative_path}"
            )));
        }
    }

    Ok(entries)
}

/// Builds the full set of tree entries for a whole promotion instance: one
/// call per `(target, source)` pair in `computed_sync_paths`.
pub async fn tree_entries_for_instance(
    rest: &gh_core::RestClient,
    owner: &str,
    repo: &str,
    default_branch: &str,
    computed_sync_paths: &std::collections::HashMap<String, String>,
) -> SynthResult<Vec<TreeEntry>> {
    let mut all_entries = Vec::new();
    for (target_path, source_path) in computed_sync_paths {
        let entries =
            tree_entries_for_pair(rest, owner, repo, default_branch, source_path, target_path)
                .await?;
        all_entries.extend(entries);
    }
    Ok(all_entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> gh_core::RestClient {
        gh_core::RestClient::new(reqwest::Client::new(), server.uri(), "token t".into())
    }

    #[tokio::test]
    async fn replacement_emits_subtree_plus_deletions_for_target_only_files() {
        let server = MockServer::start().await;

        // parent listing for directory-hash lookup of the source dir
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "foo", "path": "workspace/foo", "sha": "srcsha", "type": "dir"},
            ])))
            .mount(&server)
            .await;

        // source flat map
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace/foo$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "values.yaml", "path": "workspace/foo/values.yaml", "sha": "s1", "type": "file"},
            ])))
            .mount(&server)
            .await;

        // target flat map: has an extra file not present in source
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/env/staging/c1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "values.yaml", "path": "env/staging/c1/values.yaml", "sha": "t1", "type": "file"},
                {"name": "stale.yaml", "path": "env/staging/c1/stale.yaml", "sha": "t2", "type": "file"},
            ])))
            .mount(&server)
            .await;

        let rest = client(&server);
        let entries = tree_entries_for_pair(
            &rest,
            "acme",
            "iac",
            "main",
            "workspace/foo",
            "env/staging/c1",
        )
        .await
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "env/staging/c1");
        assert_eq!(entries[0].kind, "tree");
        assert_eq!(entries[0].sha.as_deref(), Some("srcsha"));
        assert_eq!(entries[1].path, "env/staging/c1/stale.yaml");
        assert!(entries[1].sha.is_none());
    }

    #[tokio::test]
    async fn missing_source_falls_back_to_deleting_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/env/staging/c1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "values.yaml", "path": "env/staging/c1/values.yaml", "sha": "t1", "type": "file"},
            ])))
            .mount(&server)
            .await;

        let rest = client(&server);
        let entries = tree_entries_for_pair(
            &rest,
            "acme",
            "iac",
            "main",
            "workspace/foo",
            "env/staging/c1",
        )
        .await
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "env/staging/c1/values.yaml");
        assert!(entries[0].sha.is_none());
    }
}
