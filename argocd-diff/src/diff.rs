//! Per-application diff computation and PR-comment rendering: hard-refresh,
//! fetch live + desired state, unified-diff every modified object, then
//! fit the result under the 65,536-byte comment budget.

use std::collections::BTreeMap;

use similar::TextDiff;

use crate::client::ArgoCdClient;
use crate::errors::ArgoResult;
use crate::types::{Application, DiffElement, DiffResult};

const COMMENT_BYTE_BUDGET: usize = 65_536;
const REDACTED_PLACEHOLDER: &str = "*(diff redacted: disableArgoCDDiff is set for this component)*";

fn resource_key(group: &str, kind: &str, namespace: &str, name: &str) -> String {
    format!("{group}/{kind}/{namespace}/{name}")
}

/// Diffs one application's live state against its desired state at
/// `pr_branch`. Never returns `Err` for ArgoCD-side problems that are
/// specific to this one component; those are folded into
/// `DiffResult::diff_error` so one broken component doesn't abort the rest
/// of the orchestrator's run.
pub async fn diff_application(
    client: &dyn ArgoCdClient,
    app: &Application,
    pr_branch: &str,
    component_path: &str,
    overlay_disabled: bool,
) -> DiffResult {
    let name = app.metadata.name.clone();

    if let Err(e) = client.hard_refresh(&name).await {
        return DiffResult {
            component_path: component_path.to_string(),
            app_name: Some(name),
            app_url: app.ui_url.clone(),
            diff_elements: Vec::new(),
            has_diff: false,
            diff_error: Some(format!("hard refresh failed: {e}")),
            app_was_temporarily_created: false,
            app_synced_from_pr_branch: false,
        };
    }

    let live = match client.managed_resources(&name).await {
        Ok(v) => v,
        Err(e) => {
            return DiffResult {
                component_path: component_path.to_string(),
                app_name: Some(name),
                app_url: app.ui_url.clone(),
                diff_elements: Vec::new(),
                has_diff: false,
                diff_error: Some(format!("fetching live state failed: {e}")),
                app_was_temporarily_created: false,
                app_synced_from_pr_branch: false,
            };
        }
    };

    let desired = match client.desired_manifests(&name, pr_branch).await {
        Ok(v) => v,
        Err(e) => {
            return DiffResult {
                component_path: component_path.to_string(),
                app_name: Some(name),
                app_url: app.ui_url.clone(),
                diff_elements: Vec::new(),
                has_diff: false,
                diff_error: Some(format!("fetching desired manifests failed: {e}")),
                app_was_temporarily_created: false,
                app_synced_from_pr_branch: false,
            };
        }
    };

    let mut by_key: BTreeMap<String, (Option<String>, Option<String>, String, String, String, String)> =
        BTreeMap::new();
    for r in live {
        let key = resource_key(&r.group, &r.kind, &r.namespace, &r.name);
        by_key.insert(
            key,
            (
                r.normalized_live_state,
                None,
                r.group,
                r.kind,
                r.namespace,
                r.name,
            ),
        );
    }
    for r in desired {
        let key = resource_key(&r.group, &r.kind, &r.namespace, &r.name);
        by_key
            .entry(key)
            .and_modify(|entry| entry.1 = r.target_state.clone())
            .or_insert((None, r.target_state, r.group, r.kind, r.namespace, r.name));
    }

    let mut diff_elements = Vec::new();
    for (_, (live_state, target_state, group, kind, namespace, name)) in by_key {
        let live_text = live_state.clone().unwrap_or_default();
        let target_text = target_state.clone().unwrap_or_default();
        if live_text == target_text {
            continue;
        }

        let diff_text = if overlay_disabled {
            REDACTED_PLACEHOLDER.to_string()
        } else {
            TextDiff::from_lines(&live_text, &target_text)
                .unified_diff()
                .context_radius(10)
                .header("live", "target")
                .to_string()
        };

        diff_elements.push(DiffElement {
            group,
            kind,
            namespace,
            name,
            diff_text,
        });
    }

    let has_diff = !diff_elements.is_empty();
    DiffResult {
        component_path: component_path.to_string(),
        app_name: Some(name),
        app_url: app.ui_url.clone(),
        diff_elements,
        has_diff,
        diff_error: None,
        app_was_temporarily_created: false,
        app_synced_from_pr_branch: false,
    }
}

fn render_element(el: &DiffElement) -> String {
    format!(
        "<details><summary>{} {} <code>{}/{}</code></summary>\n\n```diff\n{}\n```\n\n</details>\n\n",
        el.kind, el.name, el.group, el.namespace, el.diff_text
    )
}

fn render_result_body(result: &DiffResult) -> String {
    let mut out = String::new();
    match (&result.app_name, &result.diff_error) {
        (Some(name), None) if result.has_diff => {
            out.push_str(&format!("Application: `{name}`"));
            if let Some(url) = &result.app_url {
                out.push_str(&format!(" ([ArgoCD]({url}))"));
            }
            out.push('\n');
            for el in &result.diff_elements {
                out.push_str(&render_element(el));
            }
        }
        (Some(name), None) => {
            out.push_str(&format!("Application `{name}`: no diff.\n"));
        }
        (_, Some(err)) => {
            out.push_str(&format!("Diff skipped: {err}\n"));
        }
        (None, None) => {
            out.push_str("No matching ArgoCD application found.\n");
        }
    }
    if result.app_was_temporarily_created {
        out.push_str("\n_A temporary Application object was created to render this diff._\n");
    }
    out
}

fn render_concise(result: &DiffResult) -> String {
    let status = if let Some(err) = &result.diff_error {
        format!("diff error: {err}")
    } else if result.has_diff {
        format!("{} object(s) differ (diff omitted for size)", result.diff_elements.len())
    } else {
        "no diff".to_string()
    };
    format!(
        "### `{}`\n\n{}\n",
        result.component_path, status
    )
}

/// Renders the full multi-component comment.
fn render_full(results: &[DiffResult]) -> String {
    let mut out = String::from("## ArgoCD diff\n\n");
    for r in results {
        out.push_str(&format!("### `{}`\n\n", r.component_path));
        out.push_str(&render_result_body(r));
        out.push('\n');
    }
    out
}

fn render_component(index: usize, total: usize, result: &DiffResult) -> String {
    let header = format!(
        "Component {}/{total}: `{}` (Split for comment size)\n\n",
        index + 1,
        result.component_path
    );
    let body = render_result_body(result);
    let combined = format!("{header}{body}");
    if combined.len() <= COMMENT_BYTE_BUDGET {
        combined
    } else {
        format!("{header}{}", render_concise(result))
    }
}

/// Comment-sizing strategy: try one combined comment first,
/// fall back to one comment per component, and fall back further to a
/// concise per-component template when even that overflows.
pub fn render_comments(results: &[DiffResult]) -> Vec<String> {
    if results.is_empty() {
        return vec!["## ArgoCD diff\n\nNo components with ArgoCD-managed state changed.\n".to_string()];
    }

    let full = render_full(results);
    if full.len() <= COMMENT_BYTE_BUDGET {
        return vec![full];
    }

    let total = results.len();
    results
        .iter()
        .enumerate()
        .map(|(i, r)| render_component(i, total, r))
        .collect()
}

pub fn diff_result_needs_merge_block(results: &[DiffResult]) -> bool {
    !results.is_empty()
        && results.iter().all(|r| !r.has_diff && r.diff_error.is_none())
}

pub async fn post_diff_comments(
    rest: &gh_core::RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
    results: &[DiffResult],
) -> ArgoResult<()> {
    for body in render_comments(results) {
        commit_synthesizer::commit::comment_on_pr(rest, owner, repo, pr_number, &body).await?;
    }
    Ok(())
}
