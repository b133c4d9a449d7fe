//! Merge retry.
//!
//! GitHub briefly rejects merges with a 405 while its merge queue settles.
//! Only that specific, narrow error ("405" + "try the merge again") is
//! retried with exponential backoff; everything else — including other
//! 405s — is a permanent failure and propagates immediately. Broadening
//! this classifier would mask real merge conflicts, so it is deliberately
//! preserved as-is rather than generalized.

use gh_core::{GhError, RestClient};
use serde::Serialize;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Serialize)]
struct MergeRequest {
    merge_method: &'static str,
}

async fn try_merge_once(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> Result<(), GhError> {
    rest.put_json::<_, serde_json::Value>(
        &format!("/repos/{owner}/{repo}/pulls/{pr_number}/merge"),
        &MergeRequest {
            merge_method: "merge",
        },
    )
    .await?;
    Ok(())
}

/// Merges a PR, retrying only the narrow "405 + try the merge again"
/// class of error with exponential backoff.
pub async fn merge_with_retry(
    rest: &RestClient,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> Result<(), GhError> {
    let mut backoff = INITIAL_BACKOFF_MS;
    for attempt in 1..=MAX_ATTEMPTS {
        match try_merge_once(rest, owner, repo, pr_number).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable_merge_error() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, %pr_number, %err, "merge rejected, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                backoff *= 2;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop always returns on its final iteration")
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
    async fn retries_only_the_specific_405_message() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/iac/pulls/5/merge"))
            .respond_with(
                ResponseTemplate::new(405).set_body_string("please try the merge again later"),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/iac/pulls/5/merge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"merged": true})))
            .mount(&server)
            .await;

        let rest = client(&server);
        merge_with_retry(&rest, "acme", "iac", 5).await.unwrap();
    }

    #[tokio::test]
    async fn does_not_retry_unrelated_405s() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/iac/pulls/5/merge"))
            .respond_with(ResponseTemplate::new(405).set_body_string("method not allowed"))
            .mount(&server)
            .await;

        let rest = client(&server);
        let err = merge_with_retry(&rest, "acme", "iac", 5).await.unwrap_err();
        assert_eq!(err.status_code(), Some(405));
    }

    #[tokio::test]
    async fn does_not_retry_server_errors() {
        // The classifier is intentionally narrow to the specific 405
        // message, not broadened to any 5xx.
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/iac/pulls/5/merge"))
            .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
            .mount(&server)
            .await;

        let rest = client(&server);
        let err = merge_with_retry(&rest, "acme", "iac", 5).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn does_not_retry_permanent_conflicts() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/iac/pulls/5/merge"))
            .respond_with(ResponseTemplate::new(409).set_body_string("merge conflict"))
            .mount(&server)
            .await;

        let rest = client(&server);
        let err = merge_with_retry(&rest, "acme", "iac", 5).await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));
    }
}
