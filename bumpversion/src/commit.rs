//! Single-file commit synthesis for the bump commands — a simpler sibling
//! of `commit_synthesizer::tree`, which replaces whole subtrees. Here
//! there is exactly one file, so the blob is created directly rather than
//! resolved from an existing directory's object hash.

use gh_core::RestClient;
use repo_tree::TreeEntry;
use serde::{Deserialize, Serialize};

use crate::errors::BumpResult;

#[derive(Serialize)]
struct CreateBlobRequest<'a> {
    content: &'a str,
    encoding: &'static str,
}

#[derive(Deserialize)]
struct BlobResponse {
    sha: String,
}

/// Creates a Git blob object holding `content`, returning its SHA.
async fn create_blob(rest: &RestClient, owner: &str, repo: &str, content: &str) -> BumpResult<String> {
    let blob: BlobResponse = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/git/blobs"),
            &CreateBlobRequest {
                content,
                encoding: "utf-8",
            },
        )
        .await?;
    Ok(blob.sha)
}

#[derive(Serialize)]
struct CreateTreeRequest<'a> {
    base_tree: &'a str,
    tree: &'a [TreeEntry],
}

#[derive(Deserialize)]
struct TreeResponse {
    sha: String,
}

#[derive(Serialize)]
struct CommitAuthor<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct CreateCommitRequest<'a> {
    message: &'a str,
    parents: [&'a str; 1],
    tree: &'a str,
    author: CommitAuthor<'a>,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

/// Creates the blob, a tree that overlays it onto `target_file` on top of
/// `base_commit_sha`'s tree, and the commit carrying it. Returns the new
/// commit's SHA.
pub async fn create_single_file_commit(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    base_commit_sha: &str,
    target_file: &str,
    new_content: &str,
    message: &str,
) -> BumpResult<String> {
    let blob_sha = create_blob(rest, owner, repo, new_content).await?;

    let tree: TreeResponse = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/git/trees"),
            &CreateTreeRequest {
                base_tree: base_commit_sha,
                tree: &[TreeEntry::blob(target_file, blob_sha)],
            },
        )
        .await?;

    let commit: CommitResponse = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/git/commits"),
            &CreateCommitRequest {
                message,
                parents: [base_commit_sha],
                tree: &tree.sha,
                author: CommitAuthor {
                    name: "Telefonistka GitOps Bot",
                    email: "gitops-telefonistka@example.com",
                },
            },
        )
        .await?;

    Ok(commit.sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chains_blob_tree_and_commit_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/git/blobs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sha": "blob1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/git/trees"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sha": "tree1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/git/commits"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sha": "commit1"})))
            .mount(&server)
            .await;

        let rest = RestClient::new(reqwest::Client::new(), server.uri(), "token t".into());
        let sha = create_single_file_commit(
            &rest,
            "acme",
            "iac",
            "base1",
            "charts/app/values.yaml",
            "tag: v2\n",
            "Bump charts/app/values.yaml",
        )
        .await
        .unwrap();
        assert_eq!(sha, "commit1");
    }
}
