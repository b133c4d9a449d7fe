//! Promotion-plan computation: given a merged pull request's changed
//! files and the in-repo configuration, compute the set of promotion
//! instances to emit.

pub mod errors;
pub mod types;

use std::collections::{HashMap, HashSet};

use gh_core::{PrContext, RestClient};
use promotion_config::{Config, component_overlay_path, parse_component_overlay};
use regex::Regex;
use tracing::{debug, error};

pub use errors::{PlannerError, PlannerResult};
pub use types::{Plan, PromotionInstance, PromotionInstanceMetadata, RelevantComponent};

const PAGE_SIZE: &str = "100";

/// **Step 1.** Lists every file changed in the pull request, paginating
/// until a page comes back short of a full page.
pub async fn list_changed_files(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> PlannerResult<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct PrFile {
        filename: String,
    }

    let mut files = Vec::new();
    let mut page = 1u32;
    loop {
        let page_str = page.to_string();
        let batch: Vec<PrFile> = rest
            .get_json_query(
                &format!("/repos/{owner}/{repo}/pulls/{pr_number}/files"),
                &[("per_page", PAGE_SIZE), ("page", &page_str)],
            )
            .await?
            .unwrap_or_default();

        let is_full_page = batch.len().to_string() == PAGE_SIZE;
        files.extend(batch.into_iter().map(|f| f.filename));
        if !is_full_page {
            break;
        }
        page += 1;
    }
    Ok(files)
}

/// **Step 2.** Projects changed files onto the set of relevant
/// `(sourcePath, componentName, autoMerge)` triples. A file matches at
/// most one `promotionPaths[*]` entry — the first one in config order —
/// mirroring "a file can only be a single source dir".
pub fn generate_list_of_relevant_components(
    changed_files: &[String],
    config: &Config,
) -> HashSet<RelevantComponent> {
    let mut out = HashSet::new();

    for changed_file in changed_files {
        for promotion_path in &config.promotion_paths {
            if !promotion_path.source_path_regex.is_match(changed_file) {
                continue;
            }

            let depth = promotion_path.component_path_extra_depth as usize + 1;
            let sub_pattern = vec!["[^/]*"; depth].join("/");
            let component_regex = match Regex::new(&format!(
                "^{}({sub_pattern})/.*",
                promotion_path.source_path_raw
            )) {
                Ok(re) => re,
                Err(err) => {
                    error!(%err, pattern = %promotion_path.source_path_raw, "failed to build component regex");
                    break;
                }
            };
            let component_name = component_regex
                .replace(changed_file, "$1")
                .into_owned();

            let source_path_regex = match Regex::new(&format!(
                "^({}){}/.*",
                promotion_path.source_path_raw,
                regex::escape(&component_name)
            )) {
                Ok(re) => re,
                Err(err) => {
                    error!(%err, "failed to build resolved-source-path regex");
                    break;
                }
            };
            let resolved_source_path = source_path_regex
                .replace(changed_file, "$1")
                .into_owned();

            out.insert(RelevantComponent {
                source_path: resolved_source_path,
                component_name,
                auto_merge: promotion_path.conditions.auto_merge,
            });
            break;
        }
    }

    out
}

/// The flattened `sourcePath + componentName` list, used independently by
/// the ArgoCD diff orchestrator, which runs without requiring a merge.
pub fn generate_list_of_changed_component_paths(
    changed_files: &[String],
    config: &Config,
) -> Vec<String> {
    generate_list_of_relevant_components(changed_files, config)
        .into_iter()
        .map(|c| format!("{}{}", c.source_path, c.component_name))
        .collect()
}

/// Fetches and parses the optional per-component overlay. A 404 is not an
/// error — it means "no overrides", treated as a `config-absent`
/// category.
async fn get_component_overlay(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    config_branch: &str,
    source_path: &str,
    component_name: &str,
) -> PlannerResult<Option<promotion_config::ComponentOverlay>> {
    let path = component_overlay_path(source_path, component_name);
    match repo_tree::fetch_file_content(rest, owner, repo, config_branch, &path).await? {
        None => Ok(None),
        Some((text, _status)) => Ok(Some(parse_component_overlay(&text)?)),
    }
}

/// **Steps 3-5.** Builds the promotion plan from the relevant components
/// identified in step 2, applying label conditions and per-component
/// allow/block lists.
pub async fn generate_plan_based_on_changed_components(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    config_branch: &str,
    config: &Config,
    relevant_components: &HashSet<RelevantComponent>,
    pr_labels: &[String],
) -> PlannerResult<Plan> {
    let mut promotions: Plan = HashMap::new();

    for component in relevant_components {
        let overlay = get_component_overlay(
            rest,
            owner,
            repo,
            config_branch,
            &component.source_path,
            &component.component_name,
        )
        .await?;

        let Some(promotion_path) = config
            .promotion_paths
            .iter()
            .find(|p| p.source_path_raw == component.source_path)
        else {
            continue;
        };

        // Step 3: skip this promotionPath if it requires labels the PR
        // doesn't carry.
        if !promotion_path.conditions.pr_has_labels.is_empty() {
            let has_required_label = promotion_path
                .conditions
                .pr_has_labels
                .iter()
                .any(|required| pr_labels.iter().any(|l| l == required));
            if !has_required_label {
                continue;
            }
        }

        for ppr in &promotion_path.promotion_prs {
            let mut target_paths = ppr.target_paths.clone();
            target_paths.sort();

            let key = types::aggregation_key(&component.source_path, &target_paths);
            let target_description = ppr
                .target_description
                .clone()
                .unwrap_or_else(|| target_paths.join(" "));

            let entry = promotions.entry(key.clone()).or_insert_with(|| {
                debug!(%key, "adding new promotion instance");
                PromotionInstance {
                    metadata: PromotionInstanceMetadata {
                        source_path: component.source_path.clone(),
                        target_paths: target_paths.clone(),
                        target_description,
                        per_component_skipped_target_paths: HashMap::new(),
                        component_names: Vec::new(),
                        auto_merge: component.auto_merge,
                    },
                    computed_sync_paths: HashMap::new(),
                }
            });

            if !entry
                .metadata
                .component_names
                .contains(&component.component_name)
            {
                entry
                    .metadata
                    .component_names
                    .push(component.component_name.clone());
            }

            for target_path in &target_paths {
                let allowed = overlay
                    .as_ref()
                    .map(|o| o.target_allowed(target_path))
                    .unwrap_or(true);

                if !allowed {
                    entry
                        .metadata
                        .per_component_skipped_target_paths
                        .entry(component.component_name.clone())
                        .or_default()
                        .push(target_path.clone());
                    continue;
                }

                entry.computed_sync_paths.insert(
                    format!("{target_path}{}", component.component_name),
                    format!("{}{}", component.source_path, component.component_name),
                );
            }
        }
    }

    Ok(promotions)
}

/// Top-level entry point: changed files + configuration -> promotion plan.
pub async fn generate_promotion_plan(
    ctx: &PrContext,
    config: &Config,
    config_branch: &str,
) -> PlannerResult<Plan> {
    let changed_files = list_changed_files(&ctx.client.rest, &ctx.owner, &ctx.repo, ctx.pr_number).await?;
    let relevant_components = generate_list_of_relevant_components(&changed_files, config);
    generate_plan_based_on_changed_components(
        &ctx.client.rest,
        &ctx.owner,
        &ctx.repo,
        config_branch,
        config,
        &relevant_components,
        &ctx.labels,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use promotion_config::parse_root_config;

    fn cfg(yaml: &str) -> Config {
        parse_root_config(yaml).expect("valid config")
    }

    #[test]
    fn identifies_one_component_per_file() {
        let config = cfg(
            r#"
promotionPaths:
  - sourcePath: "workspace/"
    promotionPrs:
      - targetPaths: ["env/staging/us-east4/c1/"]
"#,
        );
        let files = vec!["workspace/foo/values.yaml".to_string()];
        let components = generate_list_of_relevant_components(&files, &config);
        assert_eq!(components.len(), 1);
        let c = components.iter().next().unwrap();
        assert_eq!(c.source_path, "workspace/");
        assert_eq!(c.component_name, "foo");
    }

    #[test]
    fn extra_depth_grabs_more_segments() {
        let config = cfg(
            r#"
promotionPaths:
  - sourcePath: "workspace/"
    componentPathExtraDepth: 1
    promotionPrs:
      - targetPaths: ["env/c1/"]
"#,
        );
        let files = vec!["workspace/team-a/svc1/values.yaml".to_string()];
        let components = generate_list_of_relevant_components(&files, &config);
        let c = components.iter().next().unwrap();
        assert_eq!(c.component_name, "team-a/svc1");
    }

    #[tokio::test]
    async fn target_order_independence_collapses_to_one_instance() {
        // P3: two promotionPrs entries whose sorted target sets match must
        // aggregate into a single instance regardless of config order.
        let config = cfg(
            r#"
promotionPaths:
  - sourcePath: "workspace/"
    promotionPrs:
      - targetPaths: ["b/", "a/"]
"#,
        );
        let files = vec!["workspace/foo/values.yaml".to_string()];
        let relevant = generate_list_of_relevant_components(&files, &config);

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let rest = RestClient::new(reqwest::Client::new(), server.uri(), "token t".into());

        let plan = generate_plan_based_on_changed_components(
            &rest, "acme", "iac", "main", &config, &relevant, &[],
        )
        .await
        .unwrap();

        assert_eq!(plan.len(), 1);
        let instance = plan.values().next().unwrap();
        assert_eq!(instance.metadata.target_paths, vec!["a/", "b/"]);
    }

    #[tokio::test]
    async fn label_condition_skips_promotion_path() {
        let config = cfg(
            r#"
promotionPaths:
  - sourcePath: "workspace/"
    conditions:
      prHasLabels: ["ready-to-promote"]
    promotionPrs:
      - targetPaths: ["env/staging/c1/"]
"#,
        );
        let files = vec!["workspace/foo/values.yaml".to_string()];
        let relevant = generate_list_of_relevant_components(&files, &config);

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let rest = RestClient::new(reqwest::Client::new(), server.uri(), "token t".into());

        let plan_no_label = generate_plan_based_on_changed_components(
            &rest, "acme", "iac", "main", &config, &relevant, &[],
        )
        .await
        .unwrap();
        assert!(plan_no_label.is_empty());

        let plan_with_label = generate_plan_based_on_changed_components(
            &rest,
            "acme",
            "iac",
            "main",
            &config,
            &relevant,
            &["ready-to-promote".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(plan_with_label.len(), 1);
    }
}
