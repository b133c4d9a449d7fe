//! Owned, tagged-variant models of the GitHub webhook payloads this
//! controller reads.
//!
//! Only the fields the handlers actually touch are modeled, with owned
//! `String` fields (rather than borrowed `&'a str`) since the dispatcher
//! spawns a detached `tokio::task` per event that must outlive the
//! inbound request's borrowed body.

use serde::Deserialize;

use crate::errors::{DispatchError, DispatchResult};

#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
    pub owner: RepoOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub body: Option<String>,
    pub user: User,
    pub head: PrRef,
    pub base: PrRef,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Only non-null once the PR has actually been merged (as opposed to
    /// merely closed).
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Synchronize,
    Closed,
    Labeled,
    Unlabeled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: RepoInfo,
    pub sender: User,
    /// Only present on `labeled`/`unlabeled` actions.
    #[serde(default)]
    pub label: Option<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: RepoInfo,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueCommentAction {
    Created,
    Edited,
    Deleted,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    /// Present (non-null) only when the "issue" is actually a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub node_id: String,
    pub body: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BodyChange {
    pub from: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Changes {
    #[serde(default)]
    pub body: Option<BodyChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: IssueCommentAction,
    pub issue: IssueRef,
    pub comment: Comment,
    pub repository: RepoInfo,
    pub sender: User,
    /// Present on `edited` events; `changes.body.from` is the comment's
    /// text before this edit, used to detect a checkbox transitioning
    /// unchecked -> checked.
    #[serde(default)]
    pub changes: Option<Changes>,
}

/// One parsed webhook, tagged by the `X-GitHub-Event` header. Event types this controller doesn't act on are
/// preserved as `Other` rather than dropped at the parse boundary, so the
/// dispatcher can log them distinctly from a genuine parse failure.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Push(PushEvent),
    PullRequest(PullRequestEvent),
    IssueComment(IssueCommentEvent),
    Other(String),
}

/// Parses `body` according to the `X-GitHub-Event` header value. Unknown
/// event types are not an error — GitHub sends many event types this
/// controller has no handler for (e.g. `ping`); only a body that fails to
/// deserialize *as* its declared type is a `DispatchError::Parse`.
pub fn parse_event(event_type: &str, body: &[u8]) -> DispatchResult<WebhookEvent> {
    match event_type {
        "push" => Ok(WebhookEvent::Push(serde_json::from_slice(body)?)),
        "pull_request" => Ok(WebhookEvent::PullRequest(serde_json::from_slice(body)?)),
        "issue_comment" => Ok(WebhookEvent::IssueComment(serde_json::from_slice(body)?)),
        other => Ok(WebhookEvent::Other(other.to_string())),
    }
}

/// Strict variant used by callers (e.g. the `event` CLI subcommand) that
/// want an error on an event type the controller doesn't understand at
/// all, instead of silently falling through to `Other`.
pub fn parse_known_event(event_type: &str, body: &[u8]) -> DispatchResult<WebhookEvent> {
    match parse_event(event_type, body)? {
        WebhookEvent::Other(t) => Err(DispatchError::UnknownEventType(t)),
        known => Ok(known),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pull_request_opened() {
        let body = serde_json::json!({
            "action": "opened",
            "number": 42,
            "pull_request": {
                "number": 42,
                "body": null,
                "user": {"login": "alice"},
                "head": {"ref": "feature/x", "sha": "abc123"},
                "base": {"ref": "main", "sha": "def456"},
                "labels": [{"name": "ready-to-promote"}],
            },
            "repository": {
                "name": "iac", "full_name": "acme/iac", "default_branch": "main",
                "owner": {"login": "acme"},
            },
            "sender": {"login": "alice"},
        });
        let parsed = parse_event("pull_request", body.to_string().as_bytes()).unwrap();
        match parsed {
            WebhookEvent::PullRequest(evt) => {
                assert_eq!(evt.action, PullRequestAction::Opened);
                assert_eq!(evt.pull_request.head.git_ref, "feature/x");
                assert_eq!(evt.pull_request.labels[0].name, "ready-to-promote");
            }
            _ => panic!("expected PullRequest variant"),
        }
    }

    #[test]
    fn unrecognized_action_falls_back_to_other_variant() {
        let body = serde_json::json!({
            "action": "review_requested",
            "number": 1,
            "pull_request": {
                "number": 1, "body": null, "user": {"login": "bob"},
                "head": {"ref": "x", "sha": "1"}, "base": {"ref": "main", "sha": "2"},
            },
            "repository": {
                "name": "iac", "full_name": "acme/iac", "default_branch": "main",
                "owner": {"login": "acme"},
            },
            "sender": {"login": "bob"},
        });
        let parsed = parse_event("pull_request", body.to_string().as_bytes()).unwrap();
        match parsed {
            WebhookEvent::PullRequest(evt) => assert_eq!(evt.action, PullRequestAction::Other),
            _ => panic!("expected PullRequest variant"),
        }
    }

    #[test]
    fn unknown_event_type_is_not_fatal() {
        let parsed = parse_event("ping", b"{}").unwrap();
        assert!(matches!(parsed, WebhookEvent::Other(t) if t == "ping"));
    }

    #[test]
    fn strict_parse_rejects_unknown_event_type() {
        let err = parse_known_event("ping", b"{}").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownEventType(_)));
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let err = parse_event("pull_request", b"not json").unwrap_err();
        assert!(matches!(err, DispatchError::Parse(_)));
    }
}
