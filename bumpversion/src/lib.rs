//! Bump commands: a trivial special case of the commit synthesizer that
//! opens a single-file promotion PR against an arbitrary target
//! repository, outside the context of any source pull request. Used from
//! CI via the `bump-overwrite` / `bump-regex` / `bump-yaml` CLI subcommands.

pub mod commit;
pub mod diff;
pub mod errors;
pub mod yaml_path;

use gh_core::{ClientRegistry, MAIN_IDENTITY_ENV, RestClient};
use sha1::{Digest, Sha1};
use tracing::info;

pub use errors::{BumpError, BumpResult};

/// Fields common to every bump invocation (mirrors the Go `*Params`
/// structs' shared trailer of triggering/provenance fields).
pub struct BumpRequest {
    pub target_repo: String,
    pub target_file: String,
    pub triggering_repo: String,
    pub triggering_repo_sha: String,
    pub triggering_actor: String,
    pub auto_merge: bool,
}

pub struct BumpOutcome {
    pub pr_number: u64,
    pub pr_url: String,
    pub branch_name: String,
    pub diff: String,
}

fn split_owner_repo(slug: &str) -> BumpResult<(&str, &str)> {
    slug.split_once('/')
        .ok_or_else(|| BumpError::InvalidRepoSlug(slug.to_string()))
}

fn branch_name(target_file: &str, triggering_repo_sha: &str) -> String {
    let sanitized = target_file.replace('/', "-");
    let digest = Sha1::digest(triggering_repo_sha.as_bytes());
    let short_hash = &hex::encode(digest)[..12];
    format!("bump/{sanitized}-{short_hash}")
}

#[derive(serde::Deserialize)]
struct RepoMeta {
    default_branch: String,
}

async fn default_branch(rest: &RestClient, owner: &str, repo: &str) -> BumpResult<String> {
    let meta: Option<RepoMeta> = rest.get_json(&format!("/repos/{owner}/{repo}")).await?;
    Ok(meta.map(|m| m.default_branch).unwrap_or_else(|| "main".to_string()))
}

fn commit_message(request: &BumpRequest) -> String {
    format!(
        "Bump {} (triggered by {} via {}@{})",
        request.target_file, request.triggering_actor, request.triggering_repo, request.triggering_repo_sha
    )
}

fn pr_body(request: &BumpRequest, diff: &str) -> String {
    format!(
        "Automated version bump of `{}`.\n\nTriggered by `{}` from `{}@{}`.\n\n```diff\n{diff}\n```",
        request.target_file, request.triggering_actor, request.triggering_repo, request.triggering_repo_sha
    )
}

/// Shared tail of every bump command: given the already-computed new file
/// content, diffs it against the current content, commits, branches, opens
/// the PR and optionally auto-merges it.
async fn synthesize_bump(request: &BumpRequest, new_content: String) -> BumpResult<BumpOutcome> {
    let (owner, repo) = split_owner_repo(&request.target_repo)?;
    let registry = ClientRegistry::new();
    let client = registry.ensure_and_fetch(owner, MAIN_IDENTITY_ENV).await?;
    let rest = &client.rest;

    let default_branch = default_branch(rest, owner, repo).await?;
    let initial_content = match repo_tree::fetch_file_content(rest, owner, repo, &default_branch, &request.target_file).await? {
        Some((text, _status)) => text,
        None => {
            info!(file = %request.target_file, "target file was not found, treating as new file");
            String::new()
        }
    };

    let diff = diff::render_unified(&initial_content, &new_content);
    info!("Diff:\n{diff}");

    let base_commit_sha = commit_synthesizer::commit::resolve_branch_head(rest, owner, repo, &default_branch).await?;
    let message = commit_message(request);
    let commit_sha = commit::create_single_file_commit(
        rest,
        owner,
        repo,
        &base_commit_sha,
        &request.target_file,
        &new_content,
        &message,
    )
    .await?;

    let branch = branch_name(&request.target_file, &request.triggering_repo_sha);
    commit_synthesizer::commit::create_branch(rest, owner, repo, &branch, &commit_sha).await?;

    let pr = commit_synthesizer::commit::create_pr(
        rest,
        owner,
        repo,
        &branch,
        &default_branch,
        &message,
        &pr_body(request, &diff),
    )
    .await?;

    if request.auto_merge {
        commit_synthesizer::merge::merge_with_retry(rest, owner, repo, pr.number).await?;
    }

    Ok(BumpOutcome {
        pr_number: pr.number,
        pr_url: pr.html_url,
        branch_name: branch,
        diff,
    })
}

/// `bump-overwrite`: replaces the target file's content wholesale.
pub async fn bump_overwrite(request: BumpRequest, new_content: String) -> BumpResult<BumpOutcome> {
    synthesize_bump(&request, new_content).await
}

/// `bump-regex`: applies one regex replacement across the target file.
pub async fn bump_regex(request: BumpRequest, pattern: &str, replacement: &str) -> BumpResult<BumpOutcome> {
    let (owner, repo) = split_owner_repo(&request.target_repo)?;
    let registry = ClientRegistry::new();
    let client = registry.ensure_and_fetch(owner, MAIN_IDENTITY_ENV).await?;
    let default_branch = default_branch(&client.rest, owner, repo).await?;
    let initial_content = repo_tree::fetch_file_content(&client.rest, owner, repo, &default_branch, &request.target_file)
        .await?
        .map(|(text, _)| text)
        .unwrap_or_default();

    let re = regex::Regex::new(pattern)?;
    let new_content = re.replace_all(&initial_content, replacement).into_owned();

    synthesize_bump(&request, new_content).await
}

/// `bump-yaml`: sets one dot-addressed field in a YAML file.
pub async fn bump_yaml(request: BumpRequest, address: &str, value: &str) -> BumpResult<BumpOutcome> {
    let (owner, repo) = split_owner_repo(&request.target_repo)?;
    let registry = ClientRegistry::new();
    let client = registry.ensure_and_fetch(owner, MAIN_IDENTITY_ENV).await?;
    let default_branch = default_branch(&client.rest, owner, repo).await?;
    let initial_content = repo_tree::fetch_file_content(&client.rest, owner, repo, &default_branch, &request.target_file)
        .await?
        .map(|(text, _)| text)
        .unwrap_or_default();

    let new_content = yaml_path::set_address(&initial_content, address, value)?;

    synthesize_bump(&request, new_content).await
}
