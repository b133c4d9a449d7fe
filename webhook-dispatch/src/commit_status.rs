//! Commit status lifecycle: the `"telefonistka"`
//! status context posted on the PR head SHA, plus the `issue_comment`
//! substring-triggered success/failure toggle.
//!
//! Fixed status context, a literal default target URL or a rendered
//! `CUSTOM_COMMIT_STATUS_URL_TEMPLATE_PATH` template (`.CommitTime`), and
//! a two-state (never three-state) toggle.

use chrono::Utc;
use gh_core::RestClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::DispatchResult;

const STATUS_CONTEXT: &str = "telefonistka";
const DESCRIPTION: &str = "Telefonistka GitOps Bot";
const DEFAULT_TARGET_URL: &str = "https://github.com/wayfair-incubator/telefonistka";

#[derive(Serialize)]
struct CreateStatusRequest<'a> {
    state: &'a str,
    context: &'a str,
    description: &'a str,
    target_url: &'a str,
}

/// Renders `CUSTOM_COMMIT_STATUS_URL_TEMPLATE_PATH`'s contents against
/// `.CommitTime` when the env var is set, else falls back to the literal
/// default. A template read/parse failure falls back too rather than
/// failing the whole status update — the target URL is cosmetic.
fn target_url() -> String {
    let Ok(path) = std::env::var("CUSTOM_COMMIT_STATUS_URL_TEMPLATE_PATH") else {
        return DEFAULT_TARGET_URL.to_string();
    };
    let Ok(template) = std::fs::read_to_string(&path) else {
        warn!(%path, "failed to read custom commit status url template, using default");
        return DEFAULT_TARGET_URL.to_string();
    };
    let commit_time = Utc::now().to_rfc3339();
    template.replace("{{.CommitTime}}", &commit_time)
}

/// Posts a new `"telefonistka"` status on `sha`.
pub async fn set_commit_status(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    sha: &str,
    state: &str,
) -> DispatchResult<()> {
    let url = target_url();
    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/statuses/{sha}"),
            &CreateStatusRequest {
                state,
                context: STATUS_CONTEXT,
                description: DESCRIPTION,
                target_url: &url,
            },
        )
        .await?;
    info!(%sha, %state, "commit status set");
    Ok(())
}

#[derive(Deserialize)]
struct ExistingStatus {
    context: String,
    state: String,
}

/// Flips the named status context between `success` and `failure` —
/// never a third state. A no-op (`Ok(())`) when no status with that
/// context exists yet on `sha`.
pub async fn toggle_commit_status(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    sha: &str,
    context: &str,
) -> DispatchResult<()> {
    let statuses: Vec<ExistingStatus> = rest
        .get_json(&format!("/repos/{owner}/{repo}/commits/{sha}/statuses"))
        .await?
        .unwrap_or_default();

    let Some(existing) = statuses.iter().find(|s| s.context == context) else {
        return Ok(());
    };

    let new_state = if existing.state == "success" {
        "failure"
    } else {
        "success"
    };

    let _: serde_json::Value = rest
        .post_json(
            &format!("/repos/{owner}/{repo}/statuses/{sha}"),
            &CreateStatusRequest {
                state: new_state,
                context,
                description: DESCRIPTION,
                target_url: &target_url(),
            },
        )
        .await?;
    info!(%sha, context, %new_state, "commit status toggled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RestClient {
        RestClient::new(reqwest::Client::new(), server.uri(), "token t".into())
    }

    #[tokio::test]
    async fn sets_pending_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/statuses/sha1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        set_commit_status(&client(&server), "acme", "iac", "sha1", "pending")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn toggle_flips_success_to_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/iac/commits/sha1/statuses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"context": "argocd-diff", "state": "success"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/iac/statuses/sha1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        toggle_commit_status(&client(&server), "acme", "iac", "sha1", "argocd-diff")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn toggle_is_a_noop_when_context_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/iac/commits/sha1/statuses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        toggle_commit_status(&client(&server), "acme", "iac", "sha1", "argocd-diff")
            .await
            .unwrap();
    }
}
