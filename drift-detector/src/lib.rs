//! Walks a promotion plan's `(source, target)` pairs
//! and renders a single aggregated PR comment for whatever drift survives.

pub mod diff;
pub mod errors;

pub use errors::{DriftError, DriftResult};

use std::collections::BTreeMap;

use gh_core::PrContext;
use promotion_planner::types::Plan;
use tracing::{debug, info};

/// One `source ↔ target` pair's rendered diff, keyed the same way the
/// aggregated comment groups them.
pub fn pair_key(source_path: &str, target_path: &str) -> String {
    format!("`{source_path}` \u{2194}\u{fe0f} `{target_path}`")
}

/// Runs drift detection across every computed sync path in `plan` and, if
/// any pair has drifted, posts one aggregated comment on the PR. Returns
/// the rendered comment body when a comment was posted (useful for tests
/// without a live PR), or `None` when no drift was found (P6).
pub async fn detect_and_report_drift(
    ctx: &PrContext,
    plan: &Plan,
    default_branch: &str,
) -> DriftResult<Option<String>> {
    let mut diff_map: BTreeMap<String, String> = BTreeMap::new();

    for instance in plan.values() {
        debug!(source = %instance.metadata.source_path, "checking drift");
        for (target_path, source_path) in &instance.computed_sync_paths {
            let output = diff::compare_directories(
                &ctx.client.rest,
                &ctx.owner,
                &ctx.repo,
                source_path,
                target_path,
                default_branch,
            )
            .await?;

            if let Some(body) = output {
                diff_map.insert(pair_key(source_path, target_path), body);
            }
        }
    }

    if diff_map.is_empty() {
        info!("no drift found");
        return Ok(None);
    }

    let rendered = render_drift_comment(&diff_map);
    commit_synthesizer::commit::comment_on_pr(
        &ctx.client.rest,
        &ctx.owner,
        &ctx.repo,
        ctx.pr_number,
        &rendered,
    )
    .await?;

    Ok(Some(rendered))
}

fn render_drift_comment(diff_map: &BTreeMap<String, String>) -> String {
    let mut body = String::from("## Drift detected\n\nThe following paths have drifted from their source:\n");
    for (pair, diff) in diff_map {
        body.push_str(&format!("\n### {pair}\n{diff}\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_every_pair_heading() {
        let mut map = BTreeMap::new();
        map.insert(pair_key("workspace/foo", "env/staging/c1"), "```diff\n+x\n```".to_string());
        let rendered = render_drift_comment(&map);
        assert!(rendered.contains("workspace/foo"));
        assert!(rendered.contains("env/staging/c1"));
        assert!(rendered.contains("## Drift detected"));
    }
}
