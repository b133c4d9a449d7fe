//! Stale bot comment minimization, run on `opened|reopened|synchronize`
//! before a fresh round of diff/drift comments is posted.
//!
//! GitHub's REST API has no "minimize comment" endpoint, so this reaches
//! for the `minimizeComment` GraphQL mutation via
//! `gh_core::GraphQlClient::query`.

use serde::Deserialize;
use tracing::warn;

use crate::errors::DispatchResult;
use gh_core::{GraphQlClient, RestClient};

/// Headers this controller's own comments always start with — used to
/// recognize "our previous comment" without tracking comment ids across
/// events.
const BOT_COMMENT_MARKERS: [&str; 2] = ["## ArgoCD diff", "## Drift detected"];

#[derive(Deserialize)]
struct ListedComment {
    id: u64,
    node_id: String,
    body: String,
}

const MINIMIZE_MUTATION: &str = r#"
mutation($subjectId: ID!) {
  minimizeComment(input: { subjectId: $subjectId, classifier: OUTDATED }) {
    minimizedComment { isMinimized }
  }
}
"#;

/// Minimizes every previous bot comment on `pr_number` matching
/// [`BOT_COMMENT_MARKERS`]. Best-effort: a single comment's mutation
/// failure is logged and does not abort the rest (this runs ahead of the
/// actual diff/drift work, which must proceed regardless).
pub async fn minimize_stale_comments(
    rest: &RestClient,
    graphql: &GraphQlClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> DispatchResult<()> {
    let comments: Vec<ListedComment> = rest
        .get_json(&format!("/repos/{owner}/{repo}/issues/{pr_number}/comments"))
        .await?
        .unwrap_or_default();

    for comment in comments {
        if !BOT_COMMENT_MARKERS.iter().any(|m| comment.body.starts_with(m)) {
            continue;
        }
        if let Err(err) = graphql
            .query(
                MINIMIZE_MUTATION,
                serde_json::json!({ "subjectId": comment.node_id }),
            )
            .await
        {
            warn!(comment_id = comment.id, %err, "failed to minimize stale comment");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn minimizes_only_comments_matching_a_known_marker() {
        let server = MockServer::start().await;
        let rest = RestClient::new(reqwest::Client::new(), server.uri(), "token t".into());
        let graphql =
            GraphQlClient::new(reqwest::Client::new(), format!("{}/graphql", server.uri()), "token t".into());

        Mock::given(method("GET"))
            .and(path("/repos/acme/iac/issues/42/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "node_id": "n1", "body": "## ArgoCD diff\n\nstuff"},
                {"id": 2, "node_id": "n2", "body": "just a human comment"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("\"n1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"minimizeComment": {"minimizedComment": {"isMinimized": true}}}
            })))
            .mount(&server)
            .await;

        minimize_stale_comments(&rest, &graphql, "acme", "iac", 42)
            .await
            .unwrap();
    }
}
