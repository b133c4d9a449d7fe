//! New-app materialization: when a changed component has no
//! matching ArgoCD `Application` yet, find the `ApplicationSet` whose git
//! directory generator would have produced one, render its template, and
//! create a throwaway `"temp-"`-prefixed application pointed at the PR
//! branch so the diff orchestrator has something to diff against.

use serde_json::Value;

use crate::client::ArgoCdClient;
use crate::errors::{ArgoError, ArgoResult};
use crate::types::{Application, ApplicationSet};

/// Finds the first ApplicationSet whose git generator directory glob
/// matches `component_path`.
pub async fn find_matching_application_set(
    client: &dyn ArgoCdClient,
    component_path: &str,
) -> ArgoResult<Option<ApplicationSet>> {
    let sets = client.list_application_sets().await?;
    for set in sets {
        for generator in &set.spec.generators {
            let Some(git) = &generator.git else { continue };
            for dir in &git.directories {
                if glob_matches(&dir.path, component_path) {
                    return Ok(Some(set));
                }
            }
        }
    }
    Ok(None)
}

/// Translates an ArgoCD git-generator directory glob (`*` = one path
/// segment, `**` = any number of segments) into a path match.
fn glob_matches(glob: &str, path: &str) -> bool {
    let pattern = regex::escape(glob)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]+");
    let anchored = format!("^{pattern}$");
    regex::Regex::new(&anchored)
        .map(|re| re.is_match(path))
        .unwrap_or(false)
}

/// Git-generator template parameters for one directory entry (ArgoCD's
/// `{{.path}}`, `{{.path.basename}}`, ... set).
struct PathParams {
    path: String,
    basename: String,
    filename: String,
    basename_normalized: String,
    filename_normalized: String,
    segments: Vec<String>,
}

fn normalize_segment(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

fn path_params(component_path: &str) -> PathParams {
    let basename = component_path
        .rsplit('/')
        .next()
        .unwrap_or(component_path)
        .to_string();
    PathParams {
        path: component_path.to_string(),
        basename_normalized: normalize_segment(&basename),
        filename_normalized: normalize_segment(&basename),
        filename: basename.clone(),
        basename,
        segments: component_path.split('/').map(str::to_string).collect(),
    }
}

/// Substitutes `{{.path...}}` placeholders inside every string scalar of
/// the template, recursively.
fn render_value(value: &Value, params: &PathParams) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, params)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, params)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute(raw: &str, params: &PathParams) -> String {
    let mut out = raw.to_string();
    out = out.replace("{{.path.basenameNormalized}}", &params.basename_normalized);
    out = out.replace("{{.path.filenameNormalized}}", &params.filename_normalized);
    out = out.replace("{{.path.basename}}", &params.basename);
    out = out.replace("{{.path.filename}}", &params.filename);
    out = out.replace("{{.path}}", &params.path);
    for (i, segment) in params.segments.iter().enumerate() {
        out = out.replace(&format!("{{{{index .path.segments {i}}}}}"), segment);
    }
    out
}

/// Renders an ApplicationSet's template for `component_path`, renaming it
/// to `"temp-" + original`, stripping its sync policy, and pointing it at
/// `pr_branch`.
pub fn render_temp_application(
    app_set: &ApplicationSet,
    component_path: &str,
    pr_branch: &str,
) -> ArgoResult<Application> {
    let params = path_params(component_path);
    let rendered = render_value(&app_set.spec.template, &params);

    let mut app: Application = serde_json::from_value(rendered)
        .map_err(|e| ArgoError::Template(format!("rendered template did not match Application shape: {e}")))?;

    app.metadata.name = format!("temp-{}", app.metadata.name);
    app.spec.sync_policy = None;
    app.spec.source.target_revision = pr_branch.to_string();

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_with_single_segment_wildcards_matches_exact_depth() {
        assert!(glob_matches("clusters/*/*/*", "clusters/us/prod/c1"));
        assert!(!glob_matches("clusters/*/*/*", "clusters/us/prod"));
        assert!(!glob_matches("clusters/*/*/*", "clusters/us/prod/c1/extra"));
    }

    #[test]
    fn double_star_matches_any_depth() {
        assert!(glob_matches("clusters/**", "clusters/us/prod/c1"));
    }

    #[test]
    fn template_placeholders_are_substituted() {
        let app_set = ApplicationSet {
            metadata: crate::types::AppMetadata::default(),
            spec: crate::types::ApplicationSetSpec {
                generators: vec![],
                template: serde_json::json!({
                    "metadata": {"name": "{{.path.basename}}"},
                    "spec": {
                        "source": {"repoURL": "r", "path": "{{.path}}", "targetRevision": "HEAD"}
                    }
                }),
            },
        };
        let app = render_temp_application(&app_set, "clusters/us/prod/c1", "promotions/5-x").unwrap();
        assert_eq!(app.metadata.name, "temp-c1");
        assert_eq!(app.spec.source.path.as_deref(), Some("clusters/us/prod/c1"));
        assert_eq!(app.spec.source.target_revision, "promotions/5-x");
        assert!(app.spec.sync_policy.is_none());
    }
}
