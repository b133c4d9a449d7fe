//! Turns one planned promotion instance into a branch, a commit, and an
//! open PR, then drives the best-effort side effects (label, assignee,
//! approval, auto-merge).

pub mod branch;
pub mod commit;
pub mod errors;
pub mod merge;
pub mod tree;

pub use branch::promotion_branch_name;
pub use commit::CreatedPr;
pub use errors::{SynthError, SynthResult};

use gh_core::{ClientPair, PreviousPromotion, PrContext, PrMetadata};
use promotion_planner::types::PromotionInstance;
use tracing::warn;

/// Result of synthesizing one promotion instance. The three side-effect
/// fields are independently best-effort: a failure there
/// does not roll back the PR that was already opened.
#[derive(Debug)]
pub struct SynthesisOutcome {
    pub pr: CreatedPr,
    pub branch_name: String,
    pub label_error: Option<String>,
    pub assign_error: Option<String>,
    pub approve_error: Option<String>,
    pub merge_error: Option<String>,
}

fn pr_title(component_names: &[String], target_description: &str) -> String {
    format!("🚀 Promotion: {} ➡️  {target_description}", component_names.join(","))
}

fn pr_body(source_path: &str, target_paths: &[String], ctx: &PrContext) -> String {
    let list = target_paths
        .iter()
        .map(|t| format!("- `{t}`"))
        .collect::<Vec<_>>()
        .join("\n");
    let body = format!(
        "Auto-generated promotion from PR #{} (`{}`).\n\nTarget paths:\n{list}",
        ctx.pr_number, source_path
    );

    let mut metadata = ctx.metadata.clone().unwrap_or_default();
    if metadata.original_pr_number == 0 {
        metadata.original_pr_author = ctx.author.clone();
        metadata.original_pr_number = ctx.pr_number;
    }
    metadata.promoted_paths = target_paths.to_vec();
    metadata.previous_promotion_metadata.insert(
        ctx.pr_number,
        PreviousPromotion {
            source_path: source_path.to_string(),
            target_paths: target_paths.to_vec(),
        },
    );

    metadata.append_to_body(&body)
}

/// Builds the tree, commit, branch and PR for one promotion instance, then
/// attempts the label/assign/approve/merge side effects. Each side effect's
/// failure is captured on the outcome rather than propagated, matching the
/// "reported but non-fatal individually" contract.
pub async fn synthesize_promotion(
    ctx: &PrContext,
    approver: Option<&ClientPair>,
    default_branch: &str,
    instance: &PromotionInstance,
) -> SynthResult<SynthesisOutcome> {
    let rest = &ctx.client.rest;
    let owner = &ctx.owner;
    let repo = &ctx.repo;

    let tree_entries = tree::tree_entries_for_instance(
        rest,
        owner,
        repo,
        default_branch,
        &instance.computed_sync_paths,
    )
    .await?;

    let commit_sha = commit::create_sync_commit(
        rest,
        owner,
        repo,
        default_branch,
        &tree_entries,
        &instance.metadata.source_path,
    )
    .await?;

    let branch_name = promotion_branch_name(
        ctx.pr_number,
        &ctx.head_ref,
        &instance.metadata.target_paths,
    );
    commit::create_branch(rest, owner, repo, &branch_name, &commit_sha).await?;

    let title = pr_title(
        &instance.metadata.component_names,
        &instance.metadata.target_description,
    );
    let body = pr_body(
        &instance.metadata.source_path,
        &instance.metadata.target_paths,
        ctx,
    );
    let pr = commit::create_pr(rest, owner, repo, &branch_name, default_branch, &title, &body)
        .await?;

    let label_error = commit::add_promotion_label(rest, owner, repo, pr.number)
        .await
        .err()
        .map(|e| {
            warn!(pr = pr.number, %e, "failed to add promotion label");
            e.to_string()
        });

    let assign_error = commit::assign_author(rest, owner, repo, pr.number, &ctx.author)
        .await
        .err()
        .map(|e| {
            warn!(pr = pr.number, %e, "failed to assign original author");
            e.to_string()
        });

    let approve_error = match approver {
        Some(approver) => commit::approve_pr(&approver.rest, owner, repo, pr.number)
            .await
            .err()
            .map(|e| {
                warn!(pr = pr.number, %e, "failed to auto-approve promotion pr");
                e.to_string()
            }),
        None => None,
    };

    let mut merge_error = None;
    if instance.metadata.auto_merge {
        if let Err(e) = commit::comment_on_pr(
            rest,
            owner,
            repo,
            pr.number,
            "Auto-merging this promotion because the originating component requested it.",
        )
        .await
        {
            warn!(pr = pr.number, %e, "failed to leave auto-merge acknowledgement comment");
        }

        merge_error = merge::merge_with_retry(rest, owner, repo, pr.number)
            .await
            .err()
            .map(|e| {
                warn!(pr = pr.number, %e, "auto-merge failed");
                e.to_string()
            });
    }

    Ok(SynthesisOutcome {
        pr,
        branch_name,
        label_error,
        assign_error,
        approve_error,
        merge_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_core::{ClientPair, GraphQlClient, RestClient};
    use promotion_planner::types::PromotionInstanceMetadata;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_pair(server: &MockServer) -> ClientPair {
        let http = reqwest::Client::new();
        ClientPair {
            rest: RestClient::new(http.clone(), server.uri(), "token t".into()),
            graphql: GraphQlClient::new(http, format!("{}/graphql", server.uri()), "token t".into()),
        }
    }

    #[tokio::test]
    async fn synthesizes_branch_commit_and_pr_and_tags_side_effects() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace/foo$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "values.yaml", "path": "workspace/foo/values.yaml", "sha": "s1", "type": "file"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/iac/contents/workspace$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "foo", "path": "workspace/foo", "sha": "srcsha", "type": "dir"},
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
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/git/refs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 99, "html_url": "https://github.com/acme/iac/pull/99"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/issues/99/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/issues/99/assignees"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let pair = client_pair(&server);
        let ctx = PrContext::new(
            "acme",
            "iac",
            42,
            "feature/bump",
            "headsha",
            "alice",
            vec![],
            pair,
            "initial pr body",
        );

        let mut computed_sync_paths = HashMap::new();
        computed_sync_paths.insert("env/staging/c1".to_string(), "workspace/foo".to_string());
        let instance = PromotionInstance {
            metadata: PromotionInstanceMetadata {
                source_path: "workspace/foo".into(),
                target_paths: vec!["env/staging/c1".into()],
                target_description: "staging/c1".into(),
                per_component_skipped_target_paths: HashMap::new(),
                component_names: vec!["foo".into()],
                auto_merge: false,
            },
            computed_sync_paths,
        };

        let outcome = synthesize_promotion(&ctx, None, "main", &instance)
            .await
            .unwrap();

        assert_eq!(outcome.pr.number, 99);
        assert!(outcome.branch_name.starts_with("promotions/42-feature-bump-"));
        assert!(outcome.label_error.is_none());
        assert!(outcome.assign_error.is_none());
        assert!(outcome.approve_error.is_none());
        assert!(outcome.merge_error.is_none());
    }
}
