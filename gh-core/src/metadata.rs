//! PR metadata blob: a small record base64(JSON)-encoded and embedded in
//! the PR body between sentinel markers, carrying promotion provenance
//! across a chain of auto-generated PRs.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One ancestor PR's contribution to the promotion chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousPromotion {
    pub source_path: String,
    pub target_paths: Vec<String>,
}

/// The full metadata blob embedded in a promotion PR's body.
///
/// `previous_promotion_metadata` is an append-only accumulator keyed by
/// ancestor PR number, not a linked list — a promotion PR chain can fan
/// out and back in, and every hop's contribution must stay visible.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrMetadata {
    pub original_pr_author: String,
    pub original_pr_number: u64,
    pub promoted_paths: Vec<String>,
    #[serde(default)]
    pub previous_promotion_metadata: HashMap<u64, PreviousPromotion>,
}

const MARKER_PREFIX: &str = "<!--|Telefonistka data, do not delete|";
const MARKER_SUFFIX: &str = "|-->";

impl PrMetadata {
    /// Serializes to the exact sentinel line appended to a PR body.
    pub fn to_marker_line(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        let encoded = BASE64.encode(json);
        format!("{MARKER_PREFIX}{encoded}{MARKER_SUFFIX}")
    }

    /// Appends the marker line to a PR body; exactly one sentinel per body.
    pub fn append_to_body(&self, body: &str) -> String {
        format!("{body}\n\n{}\n", self.to_marker_line())
    }

    /// Extracts and decodes the metadata blob from a PR body.
    ///
    /// Deserialization failures are logged but not fatal (I4): callers get
    /// `None` and proceed as if no ancestry existed.
    pub fn from_body(body: &str) -> Option<Self> {
        let start = body.find(MARKER_PREFIX)?;
        let after_prefix = &body[start + MARKER_PREFIX.len()..];
        let end = after_prefix.find(MARKER_SUFFIX)?;
        let encoded = &after_prefix[..end];

        let decoded = match BASE64.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to base64-decode PR metadata blob");
                return None;
            }
        };

        match serde_json::from_slice::<Self>(&decoded) {
            Ok(meta) => Some(meta),
            Err(err) => {
                warn!(%err, "failed to deserialize PR metadata blob");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_pr_body() {
        let mut meta = PrMetadata {
            original_pr_author: "alice".into(),
            original_pr_number: 42,
            promoted_paths: vec!["env/staging/us-east4/c1/".into()],
            previous_promotion_metadata: HashMap::new(),
        };
        meta.previous_promotion_metadata.insert(
            42,
            PreviousPromotion {
                source_path: "workspace/".into(),
                target_paths: vec!["env/staging/us-east4/c1/".into()],
            },
        );

        let body = meta.append_to_body("Promotion of PR #42");
        let decoded = PrMetadata::from_body(&body).expect("metadata present");
        assert_eq!(decoded, meta);
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(PrMetadata::from_body("just a plain PR body").is_none());
    }

    #[test]
    fn garbage_marker_is_logged_not_fatal() {
        let body = format!("body\n{MARKER_PREFIX}not-valid-base64!!{MARKER_SUFFIX}\n");
        assert!(PrMetadata::from_body(&body).is_none());
    }
}
