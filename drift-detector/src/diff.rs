//! Detects and renders drift between
//! a source directory and a target directory that is supposed to track it.
//!
//! Two-stage comparison: first compare the two directories' Git object
//! SHAs (one API call each) and skip the expensive part entirely if they
//! match; only fall through to a full recursive flat-map + per-file diff
//! when the cheap check says they differ.

use std::collections::HashMap;

use gh_core::RestClient;
use repo_tree::{fetch_directory_object_hash, fetch_file_content, flat_map_file_tree};
use similar::TextDiff;

use crate::errors::DriftResult;

/// `None` means the two directories are identical (P6: diff-empty implies
/// no comment is ever rendered for this pair).
pub async fn compare_directories(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    source_path: &str,
    target_path: &str,
    default_branch: &str,
) -> DriftResult<Option<String>> {
    let source_sha = fetch_directory_object_hash(rest, owner, repo, default_branch, source_path).await?;
    let target_sha = fetch_directory_object_hash(rest, owner, repo, default_branch, target_path).await?;

    if source_sha == target_sha {
        return Ok(None);
    }

    let source_files = flat_map_file_tree(rest, owner, repo, default_branch, source_path).await?;
    let target_files = flat_map_file_tree(rest, owner, repo, default_branch, target_path).await?;

    generate_diff_output(rest, owner, repo, default_branch, &source_files, &target_files, source_path, target_path).await
}

async fn generate_diff_output(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    default_branch: &str,
    source_files: &HashMap<String, String>,
    target_files: &HashMap<String, String>,
    source_path: &str,
    target_path: &str,
) -> DriftResult<Option<String>> {
    let mut body = String::from("\n```diff\n");
    let mut files_with_diff = Vec::new();
    let mut has_diff = false;

    let mut relative_paths: Vec<&String> = source_files.keys().collect();
    relative_paths.sort();

    for relative in relative_paths {
        let source_sha = &source_files[relative];
        let source_file_path = format!("{source_path}/{relative}");
        let target_file_path = format!("{target_path}/{relative}");

        match target_files.get(relative) {
            Some(target_sha) if target_sha == source_sha => {}
            Some(_) => {
                has_diff = true;
                let (source_content, _) =
                    fetch_file_content(rest, owner, repo, default_branch, &source_file_path)
                        .await?
                        .unwrap_or_default();
                let (target_content, _) =
                    fetch_file_content(rest, owner, repo, default_branch, &target_file_path)
                        .await?
                        .unwrap_or_default();

                let diff = TextDiff::from_lines(&source_content, &target_content);
                let unified = diff
                    .unified_diff()
                    .context_radius(3)
                    .header(&source_file_path, &target_file_path)
                    .to_string();
                body.push_str(&unified);
                files_with_diff.push(source_file_path);
            }
            None => {
                has_diff = true;
                body.push_str(&format!(
                    "--- {source_file_path} (missing from target dir {target_path})\n"
                ));
            }
        }
    }

    let mut missing_from_source: Vec<&String> = target_files
        .keys()
        .filter(|relative| !source_files.contains_key(*relative))
        .collect();
    missing_from_source.sort();
    for relative in missing_from_source {
        has_diff = true;
        body.push_str(&format!(
            "+++ {target_path}/{relative} (missing from source dir {source_path})\n"
        ));
    }

    body.push_str("\n```\n");

    if !has_diff {
        return Ok(None);
    }

    if !files_with_diff.is_empty() {
        body.push_str("\n### Blame Links:\n");
        // Blame is a web-UI route, not an API route — must use the plain
        // `github.com` (or Enterprise) host, not `rest`'s `/api/v3` base.
        let blame_url_prefix = format!("{}/{owner}/{repo}/blame", gh_core::github_web_base_url());
        for file in &files_with_diff {
            body.push_str(&format!("[{file}]({blame_url_prefix}/HEAD/{file})\n"));
        }
    }

    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RestClient {
        RestClient::new(reqwest::Client::new(), server.uri(), "token t".into())
    }

    #[tokio::test]
    async fn identical_object_shas_skip_full_compare() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "foo", "path": "workspace/foo", "sha": "same", "type": "dir"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/env/staging$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "c1", "path": "env/staging/c1", "sha": "same", "type": "dir"},
            ])))
            .mount(&server)
            .await;

        let rest = client(&server);
        let result = compare_directories(&rest, "acme", "iac", "workspace/foo", "env/staging/c1", "main")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn differing_shas_triggers_full_diff_with_blame_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "foo", "path": "workspace/foo", "sha": "srcsha", "type": "dir"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/env/staging$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "c1", "path": "env/staging/c1", "sha": "tgtsha", "type": "dir"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace/foo$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "values.yaml", "path": "workspace/foo/values.yaml", "sha": "s1", "type": "file"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/env/staging/c1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "values.yaml", "path": "env/staging/c1/values.yaml", "sha": "t1", "type": "file"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace/foo/values\.yaml$"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string("replicas: 1\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/env/staging/c1/values\.yaml$"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string("replicas: 2\n"))
            .mount(&server)
            .await;

        let rest = client(&server);
        let result = compare_directories(&rest, "acme", "iac", "workspace/foo", "env/staging/c1", "main")
            .await
            .unwrap();
        let body = result.expect("expected a drift diff");
        assert!(body.contains("replicas"));
        assert!(body.contains("### Blame Links:"));
        assert!(body.contains("workspace/foo/values.yaml"));
    }
}
