//! Top-level ArgoCD diff run: discovers an application
//! per changed component, diffs it against the PR branch, with up to `K`
//! components in flight at once.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::client::ArgoCdClient;
use crate::diff::diff_application;
use crate::discovery::discover_app_for_component;
use crate::errors::ArgoResult;
use crate::temp_app::{find_matching_application_set, render_temp_application};
use crate::types::DiffResult;

const DEFAULT_CONCURRENCY: usize = 4;

pub fn concurrency_from_env() -> usize {
    std::env::var("ARGOCD_DIFF_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(DEFAULT_CONCURRENCY)
}

/// One component this run needs a diff for, with its per-component
/// overlay already resolved.
#[derive(Debug, Clone)]
pub struct ComponentJob {
    pub component_path: String,
    pub disable_diff: bool,
}

async fn diff_one(
    client: Arc<dyn ArgoCdClient>,
    repo_url: String,
    pr_branch: String,
    use_sha_label: bool,
    create_temp_apps: bool,
    job: ComponentJob,
) -> DiffResult {
    let discovered = discover_app_for_component(
        client.as_ref(),
        &repo_url,
        &job.component_path,
        use_sha_label,
    )
    .await;

    let app = match discovered {
        Ok(Some(app)) => app,
        Ok(None) if create_temp_apps => {
            match materialize_temp_app(client.as_ref(), &job.component_path, &pr_branch).await {
                Ok(Some(app)) => app,
                Ok(None) => {
                    return DiffResult::skipped(
                        &job.component_path,
                        "no matching ArgoCD application or applicationset found",
                    );
                }
                Err(e) => {
                    warn!(component = %job.component_path, %e, "failed to materialize temp application");
                    return DiffResult::skipped(&job.component_path, format!("temp app creation failed: {e}"));
                }
            }
        }
        Ok(None) => {
            return DiffResult::skipped(&job.component_path, "no matching ArgoCD application found");
        }
        Err(e) => {
            return DiffResult::skipped(&job.component_path, format!("application discovery failed: {e}"));
        }
    };

    let was_temp = app.metadata.name.starts_with("temp-");
    let mut result = diff_application(
        client.as_ref(),
        &app,
        &pr_branch,
        &job.component_path,
        job.disable_diff,
    )
    .await;
    result.app_was_temporarily_created = was_temp;

    if was_temp && result.diff_error.is_none() {
        if let Err(e) = client.delete_application(&app.metadata.name).await {
            warn!(app = %app.metadata.name, %e, "failed to delete temporary application");
        }
    }

    result
}

async fn materialize_temp_app(
    client: &dyn ArgoCdClient,
    component_path: &str,
    pr_branch: &str,
) -> ArgoResult<Option<crate::types::Application>> {
    let Some(app_set) = find_matching_application_set(client, component_path).await? else {
        return Ok(None);
    };
    let app = render_temp_application(&app_set, component_path, pr_branch)?;
    client.create_application(&app).await?;
    Ok(Some(app))
}

/// Runs the diff for every job with up to `concurrency` in flight at once.
pub async fn run(
    client: Arc<dyn ArgoCdClient>,
    repo_url: &str,
    pr_branch: &str,
    jobs: Vec<ComponentJob>,
    use_sha_label: bool,
    create_temp_apps: bool,
    concurrency: usize,
) -> Vec<DiffResult> {
    let repo_url = repo_url.to_string();
    let pr_branch = pr_branch.to_string();

    stream::iter(jobs.into_iter().map(|job| {
        let client = client.clone();
        let repo_url = repo_url.clone();
        let pr_branch = pr_branch.clone();
        async move { diff_one(client, repo_url, pr_branch, use_sha_label, create_temp_apps, job).await }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect::<Vec<_>>()
    .await
}
