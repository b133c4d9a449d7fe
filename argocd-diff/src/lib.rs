//! ArgoCD diff orchestration: for each changed component
//! in an open promotion PR, locates the matching CD application, forces a
//! hard refresh, diffs live state against the PR branch's desired state,
//! and posts a size-budgeted comment. Optionally materializes a temporary
//! application for components that don't have one yet, and auto-merges
//! promotion PRs whose diff came back empty.

pub mod client;
pub mod diff;
pub mod discovery;
pub mod errors;
pub mod orchestrator;
pub mod temp_app;
pub mod types;

pub use client::{ArgoCdClient, HttpArgoCdClient};
pub use errors::{ArgoError, ArgoResult};
pub use orchestrator::ComponentJob;
pub use types::{Application, DiffElement, DiffResult};

use std::collections::HashMap;
use std::sync::Arc;

use gh_core::PrContext;
use promotion_config::{ComponentOverlay, Config};

const NOOP_LABEL: &str = "noop";
const PROMOTION_LABEL: &str = "promotion";

/// Diffs every changed component against ArgoCD and posts the resulting
/// comment(s), then auto-merges the PR if eligible.
pub async fn diff_and_report(
    ctx: &PrContext,
    config: &Config,
    overlays: &HashMap<String, ComponentOverlay>,
    argocd: Arc<dyn ArgoCdClient>,
    repo_url: &str,
    component_paths: &[String],
) -> ArgoResult<Vec<DiffResult>> {
    let jobs = component_paths
        .iter()
        .map(|path| ComponentJob {
            component_path: path.clone(),
            disable_diff: overlays
                .get(path)
                .map(|o| o.disable_argocd_diff)
                .unwrap_or(false),
        })
        .collect::<Vec<_>>();

    let results = orchestrator::run(
        argocd,
        repo_url,
        &ctx.head_ref,
        jobs,
        config.argocd.use_sha_label_for_app_discovery,
        config.argocd.create_temp_app_object_from_new_apps,
        orchestrator::concurrency_from_env(),
    )
    .await;

    if config.argocd.comment_diff_on_pr {
        diff::post_diff_comments(&ctx.client.rest, &ctx.owner, &ctx.repo, ctx.pr_number, &results).await?;
    }

    auto_merge_if_no_diff(ctx, config, &results).await?;

    Ok(results)
}

/// Merges the PR if it carries the `promotion` label, produced zero diffs
/// and zero errors across at least one identified component, and the
/// config opted into `autoMergeNoDiffPRs`.
async fn auto_merge_if_no_diff(ctx: &PrContext, config: &Config, results: &[DiffResult]) -> ArgoResult<bool> {
    if !ctx.has_label(PROMOTION_LABEL) || !config.argocd.auto_merge_no_diff_prs {
        return Ok(false);
    }
    if !diff::diff_result_needs_merge_block(results) {
        return Ok(false);
    }

    let rest = &ctx.client.rest;
    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{}/{}/issues/{}/labels", ctx.owner, ctx.repo, ctx.pr_number),
            &[NOOP_LABEL],
        )
        .await?;
    commit_synthesizer::merge::merge_with_retry(rest, &ctx.owner, &ctx.repo, ctx.pr_number).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use types::{AppMetadata, AppSource, AppSpec, Application, ManagedResource};

    struct FakeArgoCd {
        apps: Vec<Application>,
        live: HashMap<String, Vec<ManagedResource>>,
        desired: HashMap<String, Vec<ManagedResource>>,
        refreshed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArgoCdClient for FakeArgoCd {
        async fn list_applications(&self, repo_url_filter: Option<&str>) -> ArgoResult<Vec<Application>> {
            Ok(self
                .apps
                .iter()
                .filter(|a| repo_url_filter.map(|r| a.spec.source.repo_url == r).unwrap_or(true))
                .cloned()
                .collect())
        }
        async fn list_applications_by_label(&self, label: &str, value: &str) -> ArgoResult<Vec<Application>> {
            Ok(self
                .apps
                .iter()
                .filter(|a| a.metadata.labels.get(label).map(|v| v == value).unwrap_or(false))
                .cloned()
                .collect())
        }
        async fn get_application(&self, name: &str) -> ArgoResult<Option<Application>> {
            Ok(self.apps.iter().find(|a| a.metadata.name == name).cloned())
        }
        async fn list_application_sets(&self) -> ArgoResult<Vec<types::ApplicationSet>> {
            Ok(vec![])
        }
        async fn hard_refresh(&self, name: &str) -> ArgoResult<()> {
            self.refreshed.lock().unwrap().push(name.to_string());
            Ok(())
        }
        async fn managed_resources(&self, name: &str) -> ArgoResult<Vec<ManagedResource>> {
            Ok(self.live.get(name).cloned().unwrap_or_default())
        }
        async fn desired_manifests(&self, name: &str, _revision: &str) -> ArgoResult<Vec<ManagedResource>> {
            Ok(self.desired.get(name).cloned().unwrap_or_default())
        }
        async fn create_application(&self, _app: &Application) -> ArgoResult<()> {
            Ok(())
        }
        async fn delete_application(&self, _name: &str) -> ArgoResult<()> {
            Ok(())
        }
        async fn set_target_revision(&self, _name: &str, _revision: &str) -> ArgoResult<()> {
            Ok(())
        }
        fn instance_url(&self) -> &str {
            "https://argocd.example.com"
        }
    }

    fn app(name: &str, repo_url: &str, label_hash: Option<&str>) -> Application {
        let mut labels = HashMap::new();
        if let Some(h) = label_hash {
            labels.insert(types::COMPONENT_PATH_SHA1_LABEL.to_string(), h.to_string());
        }
        Application {
            api_version: "argoproj.io/v1alpha1".into(),
            kind: "Application".into(),
            metadata: AppMetadata {
                name: name.to_string(),
                namespace: None,
                labels,
                annotations: HashMap::new(),
            },
            spec: AppSpec {
                source: AppSource {
                    repo_url: repo_url.to_string(),
                    path: Some("env/staging/c1".into()),
                    target_revision: "HEAD".into(),
                },
                sync_policy: None,
            },
            ui_url: None,
        }
    }

    fn resource(name: &str, live: Option<&str>, target: Option<&str>) -> ManagedResource {
        ManagedResource {
            group: "apps".into(),
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: name.into(),
            normalized_live_state: live.map(str::to_string),
            target_state: target.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn identical_live_and_desired_state_yields_no_diff() {
        use sha1::{Digest, Sha1};
        let component_path = "env/staging/c1";
        let mut hasher = Sha1::new();
        hasher.update(component_path.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let mut live = HashMap::new();
        live.insert("c1-app".to_string(), vec![resource("web", Some("same"), None)]);
        let mut desired = HashMap::new();
        desired.insert("c1-app".to_string(), vec![resource("web", None, Some("same"))]);

        let client: Arc<dyn ArgoCdClient> = Arc::new(FakeArgoCd {
            apps: vec![app("c1-app", "https://github.com/acme/iac", Some(&hash))],
            live,
            desired,
            refreshed: Mutex::new(vec![]),
        });

        let results = orchestrator::run(
            client,
            "https://github.com/acme/iac",
            "promotions/5-x",
            vec![ComponentJob {
                component_path: component_path.to_string(),
                disable_diff: false,
            }],
            true,
            false,
            4,
        )
        .await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].has_diff);
        assert!(results[0].diff_error.is_none());
        assert!(diff::diff_result_needs_merge_block(&results));
    }

    #[tokio::test]
    async fn differing_state_produces_a_unified_diff() {
        use sha1::{Digest, Sha1};
        let component_path = "env/staging/c1";
        let mut hasher = Sha1::new();
        hasher.update(component_path.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let mut live = HashMap::new();
        live.insert("c1-app".to_string(), vec![resource("web", Some("replicas: 1\n"), None)]);
        let mut desired = HashMap::new();
        desired.insert("c1-app".to_string(), vec![resource("web", None, Some("replicas: 2\n"))]);

        let client: Arc<dyn ArgoCdClient> = Arc::new(FakeArgoCd {
            apps: vec![app("c1-app", "https://github.com/acme/iac", Some(&hash))],
            live,
            desired,
            refreshed: Mutex::new(vec![]),
        });

        let results = orchestrator::run(
            client,
            "https://github.com/acme/iac",
            "promotions/5-x",
            vec![ComponentJob {
                component_path: component_path.to_string(),
                disable_diff: false,
            }],
            true,
            false,
            4,
        )
        .await;

        assert!(results[0].has_diff);
        assert_eq!(results[0].diff_elements.len(), 1);
        assert!(results[0].diff_elements[0].diff_text.contains("replicas"));
        assert!(!diff::diff_result_needs_merge_block(&results));
    }

    #[tokio::test]
    async fn disabled_overlay_redacts_the_diff_body() {
        use sha1::{Digest, Sha1};
        let component_path = "env/staging/c1";
        let mut hasher = Sha1::new();
        hasher.update(component_path.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let mut live = HashMap::new();
        live.insert("c1-app".to_string(), vec![resource("web", Some("a"), None)]);
        let mut desired = HashMap::new();
        desired.insert("c1-app".to_string(), vec![resource("web", None, Some("b"))]);

        let client: Arc<dyn ArgoCdClient> = Arc::new(FakeArgoCd {
            apps: vec![app("c1-app", "https://github.com/acme/iac", Some(&hash))],
            live,
            desired,
            refreshed: Mutex::new(vec![]),
        });

        let results = orchestrator::run(
            client,
            "https://github.com/acme/iac",
            "promotions/5-x",
            vec![ComponentJob {
                component_path: component_path.to_string(),
                disable_diff: true,
            }],
            true,
            false,
            4,
        )
        .await;

        assert!(results[0].has_diff);
        assert!(results[0].diff_elements[0].diff_text.contains("redacted"));
    }

    #[test]
    fn comment_rendering_falls_back_to_per_component_split_when_oversized() {
        let big_text = "x".repeat(40_000);
        let results = vec![
            DiffResult {
                component_path: "a".into(),
                app_name: Some("a-app".into()),
                app_url: None,
                diff_elements: vec![DiffElement {
                    group: "apps".into(),
                    kind: "Deployment".into(),
                    namespace: "default".into(),
                    name: "web".into(),
                    diff_text: big_text.clone(),
                }],
                has_diff: true,
                diff_error: None,
                app_was_temporarily_created: false,
                app_synced_from_pr_branch: false,
            },
            DiffResult {
                component_path: "b".into(),
                app_name: Some("b-app".into()),
                app_url: None,
                diff_elements: vec![DiffElement {
                    group: "apps".into(),
                    kind: "Deployment".into(),
                    namespace: "default".into(),
                    name: "web".into(),
                    diff_text: big_text,
                }],
                has_diff: true,
                diff_error: None,
                app_was_temporarily_created: false,
                app_synced_from_pr_branch: false,
            },
        ];

        let comments = diff::render_comments(&results);
        assert_eq!(comments.len(), 2);
        assert!(comments[0].contains("Component 1/2"));
        assert!(comments[1].contains("Component 2/2"));
        for c in &comments {
            assert!(c.len() <= 65_536);
        }
    }
}
