//! Compiled configuration: regex patterns are compiled once here and
//! reused by every planner evaluation instead of per-file.

use regex::Regex;

use crate::errors::{ConfigError, ConfigResult};
use crate::raw::{ArgoCdConfig, RawComponentOverlay, RawConfig};

fn compile(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// `sourcePath` is always matched anchored at the start of the changed
/// file's path, even if the operator's pattern doesn't itself start
/// with `^`.
fn compile_anchored(pattern: &str) -> ConfigResult<Regex> {
    if pattern.starts_with('^') {
        compile(pattern)
    } else {
        compile(&format!("^{pattern}"))
    }
}

#[derive(Debug, Clone)]
pub struct CompiledConditions {
    pub pr_has_labels: Vec<String>,
    pub auto_merge: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledPromotionPr {
    pub target_paths: Vec<String>,
    pub target_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledPromotionPath {
    pub source_path_regex: Regex,
    pub source_path_raw: String,
    pub conditions: CompiledConditions,
    pub component_path_extra_depth: u32,
    pub promotion_prs: Vec<CompiledPromotionPr>,
}

#[derive(Debug, Clone)]
pub struct CompiledWebhookEndpoint {
    pub expression: Regex,
    pub replacements: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub promotion_paths: Vec<CompiledPromotionPath>,
    pub promotion_pr_labels: Vec<String>,
    pub dry_run_mode: bool,
    pub auto_approve_promotion_prs: bool,
    pub toggle_commit_status: std::collections::HashMap<String, String>,
    pub webhook_endpoint_regexs: Vec<CompiledWebhookEndpoint>,
    pub argocd: ArgoCdConfig,
}

impl Config {
    pub fn compile(raw: RawConfig) -> ConfigResult<Self> {
        let mut promotion_paths = Vec::with_capacity(raw.promotion_paths.len());
        for p in raw.promotion_paths {
            let source_path_regex = compile_anchored(&p.source_path)?;
            let promotion_prs = p
                .promotion_prs
                .into_iter()
                .map(|pr| CompiledPromotionPr {
                    target_paths: pr.target_paths,
                    target_description: pr.target_description,
                })
                .collect();
            promotion_paths.push(CompiledPromotionPath {
                source_path_regex,
                source_path_raw: p.source_path,
                conditions: CompiledConditions {
                    pr_has_labels: p.conditions.pr_has_labels,
                    auto_merge: p.conditions.auto_merge,
                },
                component_path_extra_depth: p.component_path_extra_depth,
                promotion_prs,
            });
        }

        let mut webhook_endpoint_regexs = Vec::with_capacity(raw.webhook_endpoint_regexs.len());
        for w in raw.webhook_endpoint_regexs {
            webhook_endpoint_regexs.push(CompiledWebhookEndpoint {
                expression: compile(&w.expression)?,
                replacements: w.replacements,
            });
        }

        Ok(Self {
            promotion_paths,
            promotion_pr_labels: raw.promotion_pr_labels,
            dry_run_mode: raw.dry_run_mode,
            auto_approve_promotion_prs: raw.auto_approve_promotion_prs,
            toggle_commit_status: raw.toggle_commit_status,
            webhook_endpoint_regexs,
            argocd: raw.argocd,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ComponentOverlay {
    pub allow_list: Vec<Regex>,
    pub block_list: Vec<Regex>,
    pub disable_argocd_diff: bool,
}

impl ComponentOverlay {
    pub fn compile(raw: RawComponentOverlay) -> ConfigResult<Self> {
        let allow_list = raw
            .promotion_target_allow_list
            .iter()
            .map(|p| compile(p))
            .collect::<ConfigResult<Vec<_>>>()?;
        let block_list = raw
            .promotion_target_block_list
            .iter()
            .map(|p| compile(p))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self {
            allow_list,
            block_list,
            disable_argocd_diff: raw.disable_argocd_diff,
        })
    }

    /// I3: a target survives iff it passes both the allow list (if any)
    /// and the block list, with block-list matches taking precedence.
    pub fn target_allowed(&self, target_path: &str) -> bool {
        if self.block_list.iter().any(|r| r.is_match(target_path)) {
            return false;
        }
        if !self.allow_list.is_empty() && !self.allow_list.iter().any(|r| r.is_match(target_path))
        {
            return false;
        }
        true
    }
}
