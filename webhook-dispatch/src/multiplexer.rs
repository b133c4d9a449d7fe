//! Webhook multiplexing: fans a `push` webhook out to downstream
//! endpoints derived from `webhookEndpointRegexs`, forwarding
//! the inbound method/headers/body unchanged so signature validation
//! passes downstream, one `tokio::spawn`ed task per endpoint joined
//! through a `JoinSet`.

use std::collections::HashSet;

use promotion_config::Config;
use reqwest::Method;
use reqwest::header::HeaderMap;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::events::PushCommit;
use crate::metrics::WEBHOOK_PROXY_REQUESTS_TOTAL;

/// Deduplicated union of every `added`/`modified`/`removed` path across
/// all commits in a push.
pub fn changed_paths(commits: &[PushCommit]) -> HashSet<String> {
    let mut paths = HashSet::new();
    for commit in commits {
        paths.extend(commit.added.iter().cloned());
        paths.extend(commit.modified.iter().cloned());
        paths.extend(commit.removed.iter().cloned());
    }
    paths
}

/// For each changed path, the *first* matching `webhookEndpointRegexs[i]`
/// wins; every one of its `replacements[j]` expands against that match
/// and is added to the endpoint set (`generateListOfEndpoints`).
pub fn endpoints_for_paths(paths: &HashSet<String>, config: &Config) -> HashSet<String> {
    let mut endpoints = HashSet::new();
    for path in paths {
        for rule in &config.webhook_endpoint_regexs {
            let Some(captures) = rule.expression.captures(path) else {
                continue;
            };
            for replacement in &rule.replacements {
                let mut expanded = String::new();
                captures.expand(replacement, &mut expanded);
                endpoints.insert(expanded);
            }
            break;
        }
    }
    endpoints
}

/// Forwards the inbound request's method/headers/body to every endpoint
/// in parallel and drains the responses. Non-2xx responses are logged,
/// never propagated — the inbound webhook's HTTP 200 was already sent by
/// the caller, and downstream outages must not affect GitHub's view of
/// delivery.
pub async fn forward_to_endpoints(
    http: &reqwest::Client,
    method: Method,
    headers: &HeaderMap,
    body: bytes::Bytes,
    endpoints: HashSet<String>,
) {
    let mut joins = JoinSet::new();
    for endpoint in endpoints {
        let http = http.clone();
        let method = method.clone();
        let headers = headers.clone();
        let body = body.clone();
        joins.spawn(async move {
            let result = http
                .request(method, &endpoint)
                .headers(headers)
                .body(body)
                .send()
                .await;
            (endpoint, result)
        });
    }

    while let Some(joined) = joins.join_next().await {
        let Ok((endpoint, result)) = joined else {
            continue;
        };
        match result {
            Ok(resp) => {
                let status = resp.status();
                WEBHOOK_PROXY_REQUESTS_TOTAL
                    .with_label_values(&["POST", &status.as_u16().to_string(), &endpoint])
                    .inc();
                if !status.is_success() {
                    warn!(%endpoint, %status, "webhook forward returned a non-2xx status");
                } else {
                    debug!(%endpoint, %status, "webhook forwarded");
                }
            }
            Err(err) => {
                WEBHOOK_PROXY_REQUESTS_TOTAL
                    .with_label_values(&["POST", "error", &endpoint])
                    .inc();
                warn!(%endpoint, %err, "failed to forward webhook");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promotion_config::parse_root_config;

    #[test]
    fn dedupes_added_modified_removed_across_commits() {
        let commits = vec![
            PushCommit {
                added: vec!["a.yaml".into()],
                modified: vec!["b.yaml".into()],
                removed: vec![],
            },
            PushCommit {
                added: vec![],
                modified: vec!["a.yaml".into()],
                removed: vec!["c.yaml".into()],
            },
        ];
        let paths = changed_paths(&commits);
        assert_eq!(paths.len(), 3);
        assert!(paths.contains("a.yaml"));
        assert!(paths.contains("b.yaml"));
        assert!(paths.contains("c.yaml"));
    }

    #[test]
    fn fans_out_to_every_replacement_of_the_first_matching_rule() {
        let cfg = parse_root_config(
            r#"
webhookEndpointRegexs:
  - expression: "^clusters/([^/]+)/([^/]+)/([^/]+)/.*"
    replacements:
      - "https://a-${1}-${2}-${3}/"
      - "https://b-${1}-${2}-${3}/"
"#,
        )
        .unwrap();
        let mut paths = HashSet::new();
        paths.insert("clusters/sdeprod/dsm1/c1/app/values.yaml".to_string());

        let endpoints = endpoints_for_paths(&paths, &cfg);
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.contains("https://a-sdeprod-dsm1-c1/"));
        assert!(endpoints.contains("https://b-sdeprod-dsm1-c1/"));
    }

    #[test]
    fn non_matching_path_produces_no_endpoint() {
        let cfg = parse_root_config(
            r#"
webhookEndpointRegexs:
  - expression: "^clusters/.*"
    replacements: ["https://x/"]
"#,
        )
        .unwrap();
        let mut paths = HashSet::new();
        paths.insert("workspace/foo/values.yaml".to_string());
        assert!(endpoints_for_paths(&paths, &cfg).is_empty());
    }
}
