//! Low-level Git tree/commit/branch/PR synthesis. Never
//! performs a local checkout — every mutation goes through GitHub's
//! low-level Git Data API.

use gh_core::RestClient;
use repo_tree::TreeEntry;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{SynthError, SynthResult};

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitRef {
    object: RefObject,
}

/// Resolves `heads/<branch>` to its current commit SHA.
pub async fn resolve_branch_head(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    branch: &str,
) -> SynthResult<String> {
    let r: Option<GitRef> = rest
        .get_json(&format!("/repos/{owner}/{repo}/git/ref/heads/{branch}"))
        .await?;
    r.map(|r| r.object.sha)
        .ok_or_else(|| SynthError::RefNotFound(branch.to_string()))
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

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Serialize)]
struct CommitAuthor<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct CreateCommitRequest<'a> {
    message: String,
    parents: [&'a str; 1],
    tree: &'a str,
    author: CommitAuthor<'a>,
}

/// Creates the new tree (based on the default branch's current tree) and
/// the commit that carries it, returning the new commit's SHA.
pub async fn create_sync_commit(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    default_branch: &str,
    tree_entries: &[TreeEntry],
    source_path: &str,
) -> SynthResult<String> {
    let base_commit_sha = resolve_branch_head(rest, owner, repo, default_branch).await?;

    let tree: TreeResponse = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/git/trees"),
            &CreateTreeRequest {
                base_tree: &base_commit_sha,
                tree: tree_entries,
            },
        )
        .await?;

    let commit: CommitResponse = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/git/commits"),
            &CreateCommitRequest {
                message: format!("Syncing from {source_path}"),
                parents: [&base_commit_sha],
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

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

/// Creates the promotion branch pointing at `commit_sha`. Returns the full
/// `refs/heads/<name>` ref.
pub async fn create_branch(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    branch_name: &str,
    commit_sha: &str,
) -> SynthResult<String> {
    let full_ref = format!("refs/heads/{branch_name}");
    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/git/refs"),
            &CreateRefRequest {
                git_ref: full_ref.clone(),
                sha: commit_sha,
            },
        )
        .await?;
    info!(branch = %branch_name, "promotion branch created");
    Ok(full_ref)
}

#[derive(Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
pub struct CreatedPr {
    pub number: u64,
    pub html_url: String,
}

pub async fn create_pr(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    branch_name: &str,
    default_branch: &str,
    title: &str,
    body: &str,
) -> SynthResult<CreatedPr> {
    let pr: CreatedPr = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/pulls"),
            &NewPullRequest {
                title,
                body,
                head: branch_name,
                base: default_branch,
            },
        )
        .await?;
    info!(number = pr.number, "promotion PR opened");
    Ok(pr)
}

/// Adds the `promotion` label. Best-effort: failures are reported to the
/// caller but do not invalidate the PR already created.
pub async fn add_promotion_label(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> SynthResult<()> {
    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/issues/{pr_number}/labels"),
            &["promotion"],
        )
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct AssigneesRequest<'a> {
    assignees: [&'a str; 1],
}

/// Assigns the original author. Best-effort, same contract as the label.
pub async fn assign_author(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
    author: &str,
) -> SynthResult<()> {
    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/issues/{pr_number}/assignees"),
            &AssigneesRequest {
                assignees: [author],
            },
        )
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    event: &'a str,
}

/// Requests auto-approval via a second GitHub identity (the approver
/// client), so the submitting bot never approves its own PR.
pub async fn approve_pr(
    approver_rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> SynthResult<()> {
    let _: serde_json::Value = approver_rest
        .post_json(
            &format!("/repos/{owner}/{repo}/pulls/{pr_number}/reviews"),
            &ReviewRequest { event: "APPROVE" },
        )
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

pub async fn comment_on_pr(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
    body: &str,
) -> SynthResult<()> {
    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/issues/{pr_number}/comments"),
            &CommentRequest { body },
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RestClient {
        RestClient::new(reqwest::Client::new(), server.uri(), "token t".into())
    }

    #[tokio::test]
    async fn create_sync_commit_chains_ref_tree_and_commit_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/iac/git/ref/heads/main"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"object": {"sha": "base123"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/git/trees"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"sha": "tree456"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/git/commits"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"sha": "commit789"})),
            )
            .mount(&server)
            .await;

        let rest = client(&server);
        let entries = vec![TreeEntry::subtree("env/staging/c1", "srcsha")];
        let commit_sha = create_sync_commit(&rest, "acme", "iac", "main", &entries, "workspace/")
            .await
            .unwrap();
        assert_eq!(commit_sha, "commit789");
    }
}
