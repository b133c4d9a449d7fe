//! Event dispatch: the controller's single entry point, reached either
//! from the `POST /webhook` HTTP handler or the
//! `event` CLI subcommand. Validates, parses, counts, and spawns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gh_core::{
    APPROVER_IDENTITY_ENV, ClientPair, ClientRegistry, MAIN_IDENTITY_ENV, PrContext, RestClient,
};
use promotion_config::Config;
use promotion_planner::types::Plan;
use reqwest::Method;
use reqwest::header::HeaderMap;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::errors::{DispatchError, DispatchResult};
use crate::events::{
    IssueCommentAction, IssueCommentEvent, PullRequestAction, PullRequestEvent, PushEvent,
    WebhookEvent,
};
use crate::metrics::WEBHOOK_HITS_TOTAL;
use crate::{commit_status, events, minimizer, multiplexer, signature};

use argocd_diff::ArgoCdClient;

const EVENT_DEADLINE: Duration = Duration::from_secs(120);
const SHOW_PLAN_LABEL: &str = "show-plan";
const BRANCH_SYNC_CHECKBOX: &str = "telefonistka-argocd-branch-sync";

/// Everything a webhook event needs that outlives the inbound HTTP
/// request: GitHub client caches (two identities), the
/// ArgoCD client, and the raw webhook secret.
pub struct AppContext {
    pub main_registry: ClientRegistry,
    pub approver_registry: ClientRegistry,
    pub argocd: Arc<dyn ArgoCdClient>,
    /// Plain client used only for the multiplexer's outbound forwards
    /// — deliberately not a `gh_core::RestClient`, since those carry
    /// GitHub-specific auth headers this traffic must not send.
    pub forwarding_http: reqwest::Client,
    pub webhook_secret: Vec<u8>,
    bot_login: OnceCell<String>,
}

impl AppContext {
    pub fn new(
        argocd: Arc<dyn ArgoCdClient>,
        forwarding_http: reqwest::Client,
        webhook_secret: Vec<u8>,
    ) -> Self {
        Self {
            main_registry: ClientRegistry::new(),
            approver_registry: ClientRegistry::new(),
            argocd,
            forwarding_http,
            webhook_secret,
            bot_login: OnceCell::new(),
        }
    }

    async fn main_client(&self, owner: &str) -> DispatchResult<ClientPair> {
        Ok(self.main_registry.ensure_and_fetch(owner, MAIN_IDENTITY_ENV).await?)
    }

    /// Best-effort: a missing approver identity is not configuring
    /// auto-approval at all, not an error.
    async fn approver_client(&self, owner: &str) -> Option<ClientPair> {
        match self
            .approver_registry
            .ensure_and_fetch(owner, APPROVER_IDENTITY_ENV)
            .await
        {
            Ok(pair) => Some(pair),
            Err(err) => {
                warn!(%err, "no approver identity configured, skipping auto-approval");
                None
            }
        }
    }

    /// The authenticated main identity's own login, used to ignore
    /// `issue_comment` events the bot generated itself.
    async fn bot_login(&self, rest: &RestClient) -> DispatchResult<&str> {
        #[derive(serde::Deserialize)]
        struct Viewer {
            login: String,
        }
        self.bot_login
            .get_or_try_init(|| async {
                let viewer: Viewer = rest
                    .get_json("/user")
                    .await?
                    .ok_or_else(|| DispatchError::Gh(gh_core::GhError::Api {
                        status: 404,
                        body: "GET /user returned no body".to_string(),
                    }))?;
                Ok::<_, DispatchError>(viewer.login)
            })
            .await
            .map(String::as_str)
    }
}

/// Entry point called by the HTTP handler: validates the signature,
/// parses the payload, instruments the webhook-hit counter with
/// `{validation_failed | parsing_failed | successful}`, and spawns the
/// rest of the work in a detached task carrying a 120s deadline
/// independent of the inbound request.
pub async fn handle_webhook(
    ctx: Arc<AppContext>,
    event_type: String,
    signature_header: Option<String>,
    inbound_headers: HeaderMap,
    body: Bytes,
) -> DispatchResult<()> {
    let Some(sig) = signature_header else {
        WEBHOOK_HITS_TOTAL.with_label_values(&["validation_failed"]).inc();
        return Err(DispatchError::SignatureInvalid);
    };
    if !signature::verify(&ctx.webhook_secret, &body, &sig) {
        WEBHOOK_HITS_TOTAL.with_label_values(&["validation_failed"]).inc();
        return Err(DispatchError::SignatureInvalid);
    }

    let event = match events::parse_event(&event_type, &body) {
        Ok(event) => event,
        Err(err) => {
            WEBHOOK_HITS_TOTAL.with_label_values(&["parsing_failed"]).inc();
            return Err(err);
        }
    };
    WEBHOOK_HITS_TOTAL.with_label_values(&["successful"]).inc();

    // The multiplexer re-forwards this exact request downstream, so
    // the headers spawned along with it must be the real inbound ones —
    // not a fresh empty map — or downstream signature validation fails.
    let raw_headers = inbound_headers;
    let push_body = body.clone();
    tokio::spawn(async move {
        let outcome = tokio::time::timeout(
            EVENT_DEADLINE,
            process_event(ctx, event, raw_headers, push_body),
        )
        .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(%err, "event processing failed"),
            Err(_) => error!("event processing exceeded its 120s deadline"),
        }
    });

    Ok(())
}

/// Exposed for the `event` CLI subcommand and tests: runs one already-
/// parsed event through the same state machine `handle_webhook` spawns,
/// without the signature/HTTP-framing concerns.
pub async fn process_event_for_test(ctx: Arc<AppContext>, event: WebhookEvent) -> DispatchResult<()> {
    process_event(ctx, event, HeaderMap::new(), Bytes::new()).await
}

async fn process_event(
    ctx: Arc<AppContext>,
    event: WebhookEvent,
    inbound_headers: HeaderMap,
    inbound_body: Bytes,
) -> DispatchResult<()> {
    match event {
        WebhookEvent::PullRequest(evt) => handle_pull_request(&ctx, evt).await,
        WebhookEvent::IssueComment(evt) => handle_issue_comment(&ctx, evt).await,
        WebhookEvent::Push(evt) => handle_push(&ctx, evt, inbound_headers, inbound_body).await,
        WebhookEvent::Other(kind) => {
            info!(%kind, "ignoring webhook event type with no handler");
            Ok(())
        }
    }
}

async fn load_config(rest: &RestClient, owner: &str, repo: &str, branch: &str) -> DispatchResult<Config> {
    match repo_tree::fetch_file_content(
        rest,
        owner,
        repo,
        branch,
        promotion_config::loader::ROOT_CONFIG_PATH,
    )
    .await?
    {
        None => Ok(Config::compile(promotion_config::raw::RawConfig::default())?),
        Some((text, _status)) => Ok(promotion_config::parse_root_config(&text)?),
    }
}

async fn load_overlays(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    branch: &str,
    component_paths: &[String],
) -> DispatchResult<HashMap<String, promotion_config::ComponentOverlay>> {
    let mut overlays = HashMap::new();
    for component_path in component_paths {
        let overlay_path = format!(
            "{}/{}",
            component_path.trim_end_matches('/'),
            promotion_config::loader::COMPONENT_OVERLAY_FILENAME
        );
        if let Some((text, _status)) =
            repo_tree::fetch_file_content(rest, owner, repo, branch, &overlay_path).await?
        {
            overlays.insert(component_path.clone(), promotion_config::parse_component_overlay(&text)?);
        }
    }
    Ok(overlays)
}

fn repo_url(owner: &str, repo: &str) -> String {
    format!("{}/{owner}/{repo}", gh_core::github_web_base_url())
}

fn pr_context_from_event(
    evt: &PullRequestEvent,
    client: ClientPair,
) -> PrContext {
    PrContext::new(
        evt.repository.owner.login.clone(),
        evt.repository.name.clone(),
        evt.pull_request.number,
        evt.pull_request.head.git_ref.clone(),
        evt.pull_request.head.sha.clone(),
        evt.pull_request.user.login.clone(),
        evt.pull_request.labels.iter().map(|l| l.name.clone()).collect(),
        client,
        evt.pull_request.body.as_deref().unwrap_or(""),
    )
}

/// Finalizes the `"telefonistka"` commit status based on whether the
/// handler's own work produced an error.
async fn finalize_status(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    sha: &str,
    result: &DispatchResult<()>,
) {
    let state = if result.is_ok() { "success" } else { "error" };
    if let Err(err) = commit_status::set_commit_status(rest, owner, repo, sha, state).await {
        warn!(%err, "failed to finalize commit status");
    }
}

async fn handle_pull_request(ctx: &AppContext, evt: PullRequestEvent) -> DispatchResult<()> {
    let owner = evt.repository.owner.login.clone();
    let repo = evt.repository.name.clone();
    let sha = evt
        .pull_request
        .merge_commit_sha
        .clone()
        .unwrap_or_else(|| evt.pull_request.head.sha.clone());

    match evt.action {
        PullRequestAction::Opened | PullRequestAction::Reopened | PullRequestAction::Synchronize => {
            let client = ctx.main_client(&owner).await?;
            let rest = client.rest.clone();
            commit_status::set_commit_status(&rest, &owner, &repo, &sha, "pending").await?;

            let result = run_open_pr_checks(ctx, &evt, client).await;
            finalize_status(&rest, &owner, &repo, &sha, &result).await;
            result
        }
        PullRequestAction::Closed if evt.pull_request.merged => {
            let client = ctx.main_client(&owner).await?;
            let rest = client.rest.clone();
            commit_status::set_commit_status(&rest, &owner, &repo, &sha, "pending").await?;

            let result = run_merged_pr_synthesis(ctx, &evt, client).await;
            finalize_status(&rest, &owner, &repo, &sha, &result).await;
            result
        }
        PullRequestAction::Labeled
            if evt.label.as_ref().map(|l| l.name.as_str()) == Some(SHOW_PLAN_LABEL) =>
        {
            let client = ctx.main_client(&owner).await?;
            render_dry_run_plan(&evt, client).await
        }
        _ => Ok(()),
    }
}

async fn run_open_pr_checks(
    ctx: &AppContext,
    evt: &PullRequestEvent,
    client: ClientPair,
) -> DispatchResult<()> {
    let owner = evt.repository.owner.login.clone();
    let repo = evt.repository.name.clone();
    let default_branch = evt.repository.default_branch.clone();
    let pr_context = pr_context_from_event(evt, client.clone());

    minimizer::minimize_stale_comments(&client.rest, &client.graphql, &owner, &repo, evt.number).await?;

    let config = load_config(&client.rest, &owner, &repo, &default_branch).await?;
    let plan = promotion_planner::generate_promotion_plan(&pr_context, &config, &default_branch).await?;

    if config.argocd.comment_diff_on_pr {
        let component_paths: Vec<String> = plan
            .values()
            .flat_map(|instance| {
                instance
                    .metadata
                    .component_names
                    .iter()
                    .map(move |name| format!("{}{name}", instance.metadata.source_path))
            })
            .collect();
        let overlays = load_overlays(&client.rest, &owner, &repo, &default_branch, &component_paths).await?;
        argocd_diff::diff_and_report(
            &pr_context,
            &config,
            &overlays,
            ctx.argocd.clone(),
            &repo_url(&owner, &repo),
            &component_paths,
        )
        .await?;
    }

    drift_detector::detect_and_report_drift(&pr_context, &plan, &default_branch).await?;

    Ok(())
}

async fn run_merged_pr_synthesis(
    ctx: &AppContext,
    evt: &PullRequestEvent,
    client: ClientPair,
) -> DispatchResult<()> {
    let owner = evt.repository.owner.login.clone();
    let repo = evt.repository.name.clone();
    let default_branch = evt.repository.default_branch.clone();
    let pr_context = pr_context_from_event(evt, client.clone());

    let config = load_config(&client.rest, &owner, &repo, &default_branch).await?;
    let plan = promotion_planner::generate_promotion_plan(&pr_context, &config, &default_branch).await?;

    let approver = ctx.approver_client(&owner).await;

    for instance in plan.values() {
        match commit_synthesizer::synthesize_promotion(
            &pr_context,
            approver.as_ref(),
            &default_branch,
            instance,
        )
        .await
        {
            Ok(outcome) => info!(pr = outcome.pr.number, branch = %outcome.branch_name, "promotion pr synthesized"),
            Err(err) => error!(%err, source = %instance.metadata.source_path, "failed to synthesize promotion instance"),
        }
    }

    if let Some(pattern) = &config.argocd.allow_sync_from_branch_path_regex {
        reset_synced_components_to_head(ctx, &config, &owner, &repo, &plan, pattern).await;
    }

    Ok(())
}

/// Resets any component whose path was branch-synced mid-review (via the
/// `issue_comment` checkbox) back to `targetRevision=HEAD` now that the
/// promotion has merged. Best-effort per component — one missing application must
/// not abort the rest.
async fn reset_synced_components_to_head(
    ctx: &AppContext,
    config: &Config,
    owner: &str,
    repo: &str,
    plan: &Plan,
    allow_sync_pattern: &str,
) {
    let Ok(re) = regex::Regex::new(allow_sync_pattern) else {
        warn!(pattern = %allow_sync_pattern, "invalid allowSyncFromBranchPathRegex, skipping branch-sync reset");
        return;
    };
    let repo_url = repo_url(owner, repo);

    for instance in plan.values() {
        for name in &instance.metadata.component_names {
            let component_path = format!("{}{name}", instance.metadata.source_path);
            if !re.is_match(&component_path) {
                continue;
            }
            match argocd_diff::discovery::discover_app_for_component(
                ctx.argocd.as_ref(),
                &repo_url,
                &component_path,
                config.argocd.use_sha_label_for_app_discovery,
            )
            .await
            {
                Ok(Some(app)) => {
                    if let Err(err) = ctx.argocd.set_target_revision(&app.metadata.name, "HEAD").await {
                        warn!(%err, app = %app.metadata.name, "failed to reset targetRevision to HEAD");
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(%err, %component_path, "failed to discover app for branch-sync reset"),
            }
        }
    }
}

fn render_plan_comment(plan: &Plan) -> String {
    if plan.is_empty() {
        return "## Promotion plan\n\nNo components in this PR match a configured promotion path.\n"
            .to_string();
    }
    let mut body = String::from("## Promotion plan (dry run)\n\n");
    for instance in plan.values() {
        body.push_str(&format!(
            "- `{}` → {}\n",
            instance.metadata.source_path, instance.metadata.target_description
        ));
        for (target, source) in &instance.computed_sync_paths {
            body.push_str(&format!("  - `{source}` → `{target}`\n"));
        }
        for (component, skipped) in &instance.metadata.per_component_skipped_target_paths {
            if !skipped.is_empty() {
                body.push_str(&format!("  - skipped for `{component}`: {}\n", skipped.join(", ")));
            }
        }
    }
    body
}

async fn render_dry_run_plan(evt: &PullRequestEvent, client: ClientPair) -> DispatchResult<()> {
    let owner = evt.repository.owner.login.clone();
    let repo = evt.repository.name.clone();
    let default_branch = evt.repository.default_branch.clone();
    let pr_context = pr_context_from_event(evt, client.clone());

    let config = load_config(&client.rest, &owner, &repo, &default_branch).await?;
    let plan = promotion_planner::generate_promotion_plan(&pr_context, &config, &default_branch).await?;

    commit_synthesizer::commit::comment_on_pr(
        &client.rest,
        &owner,
        &repo,
        evt.number,
        &render_plan_comment(&plan),
    )
    .await?;
    Ok(())
}

async fn handle_issue_comment(ctx: &AppContext, evt: IssueCommentEvent) -> DispatchResult<()> {
    let owner = evt.repository.owner.login.clone();
    let repo = evt.repository.name.clone();

    let client = ctx.main_client(&owner).await?;
    let bot_login = ctx.bot_login(&client.rest).await?.to_string();
    if evt.sender.login == bot_login {
        return Ok(());
    }

    if evt.issue.pull_request.is_none() {
        return Ok(());
    }
    let pr_number = evt.issue.number;

    if evt.action == IssueCommentAction::Edited && evt.comment.user.login == bot_login {
        if let Some(changes) = &evt.changes {
            if let Some(before) = &changes.body {
                if checkbox_newly_checked(&before.from, &evt.comment.body, BRANCH_SYNC_CHECKBOX) {
                    sync_in_scope_components_to_branch(ctx, &client, &owner, &repo, pr_number).await?;
                }
            }
        }
    }

    toggle_configured_statuses(&client, &owner, &repo, pr_number, &evt.comment.body).await?;

    Ok(())
}

/// `- [ ] label` transitioning to `- [x] label` (case-insensitive `x`)
/// between the previous and current comment body.
fn checkbox_newly_checked(before: &str, after: &str, label: &str) -> bool {
    let was_unchecked = before
        .lines()
        .any(|line| line.contains(label) && line.contains("[ ]"));
    let now_checked = after.lines().any(|line| {
        line.contains(label) && (line.contains("[x]") || line.contains("[X]"))
    });
    was_unchecked && now_checked
}

async fn sync_in_scope_components_to_branch(
    ctx: &AppContext,
    client: &ClientPair,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> DispatchResult<()> {
    #[derive(serde::Deserialize)]
    struct PrDetails {
        head: events::PrRef,
    }
    let pr: Option<PrDetails> = client
        .rest
        .get_json(&format!("/repos/{owner}/{repo}/pulls/{pr_number}"))
        .await?;
    let Some(pr) = pr else {
        return Ok(());
    };

    let default_branch_config = load_config(&client.rest, owner, repo, &pr.head.git_ref).await?;
    let Some(pattern) = &default_branch_config.argocd.allow_sync_from_branch_path_regex else {
        return Ok(());
    };
    let Ok(re) = regex::Regex::new(pattern) else {
        warn!(%pattern, "invalid allowSyncFromBranchPathRegex");
        return Ok(());
    };

    let changed_files =
        promotion_planner::list_changed_files(&client.rest, owner, repo, pr_number).await?;
    let relevant = promotion_planner::generate_list_of_relevant_components(
        &changed_files,
        &default_branch_config,
    );
    let repo_url = repo_url(owner, repo);

    for component in relevant {
        let component_path = format!("{}{}", component.source_path, component.component_name);
        if !re.is_match(&component_path) {
            continue;
        }
        match argocd_diff::discovery::discover_app_for_component(
            ctx.argocd.as_ref(),
            &repo_url,
            &component_path,
            default_branch_config.argocd.use_sha_label_for_app_discovery,
        )
        .await
        {
            Ok(Some(app)) => {
                if let Err(err) = ctx
                    .argocd
                    .set_target_revision(&app.metadata.name, &pr.head.git_ref)
                    .await
                {
                    warn!(%err, app = %app.metadata.name, "failed to branch-sync targetRevision");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, %component_path, "failed to discover app for branch-sync"),
        }
    }

    Ok(())
}

async fn toggle_configured_statuses(
    client: &ClientPair,
    owner: &str,
    repo: &str,
    pr_number: u64,
    comment_body: &str,
) -> DispatchResult<()> {
    #[derive(serde::Deserialize)]
    struct PrHead {
        head: events::PrRef,
    }
    let config = load_config(&client.rest, owner, repo, "HEAD").await.ok();

    let Some(config) = config else {
        return Ok(());
    };
    if config.toggle_commit_status.is_empty() {
        return Ok(());
    }

    let pr: Option<PrHead> = client
        .rest
        .get_json(&format!("/repos/{owner}/{repo}/pulls/{pr_number}"))
        .await?;
    let Some(pr) = pr else {
        return Ok(());
    };

    for (substring, context) in &config.toggle_commit_status {
        if comment_body.contains(substring.as_str()) {
            commit_status::toggle_commit_status(&client.rest, owner, repo, &pr.head.sha, context)
                .await?;
        }
    }

    Ok(())
}

async fn handle_push(
    ctx: &AppContext,
    evt: PushEvent,
    inbound_headers: HeaderMap,
    inbound_body: Bytes,
) -> DispatchResult<()> {
    let default_ref = format!("refs/heads/{}", evt.repository.default_branch);
    if evt.git_ref != default_ref {
        return Ok(());
    }

    let owner = evt.repository.owner.login.clone();
    let repo = evt.repository.name.clone();
    let client = ctx.main_client(&owner).await?;
    let config = load_config(
        &client.rest,
        &owner,
        &repo,
        &evt.repository.default_branch,
    )
    .await?;

    let changed = multiplexer::changed_paths(&evt.commits);
    let endpoints = multiplexer::endpoints_for_paths(&changed, &config);
    if endpoints.is_empty() {
        return Ok(());
    }

    multiplexer::forward_to_endpoints(
        &ctx.forwarding_http,
        Method::POST,
        &inbound_headers,
        inbound_body,
        endpoints,
    )
    .await;

    Ok(())
}
