//! Promotion branch naming.
//!
//! `promotions/<prNumber>-<first200(branch with / -> -)>-<first12(hex(sha1(targets)))>`.
//! The prefix (PR number + source branch) is kept intact and only the
//! branch-name portion is truncated, so the disambiguating part of the
//! name — which triggering PR this came from — never gets cut off.

use sha1::{Digest, Sha1};

const MAX_BRANCH_SEGMENT_LEN: usize = 200;
const HASH_PREFIX_LEN: usize = 12;

pub fn promotion_branch_name(pr_number: u64, head_ref: &str, target_paths: &[String]) -> String {
    let sanitized: String = head_ref.replace('/', "-");
    let truncated: String = sanitized.chars().take(MAX_BRANCH_SEGMENT_LEN).collect();

    let joined = target_paths.join("_");
    let digest = Sha1::digest(joined.as_bytes());
    let hex_digest = hex::encode(digest);
    let short_hash = &hex_digest[..HASH_PREFIX_LEN.min(hex_digest.len())];

    format!("promotions/{pr_number}-{truncated}-{short_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_is_bounded_and_deterministic() {
        let long_ref = "a".repeat(400);
        let targets = vec!["env/staging/us-east4/c1/".to_string()];
        let name1 = promotion_branch_name(42, &long_ref, &targets);
        let name2 = promotion_branch_name(42, &long_ref, &targets);
        assert_eq!(name1, name2);
        assert!(name1.len() <= 250, "branch name was {} chars", name1.len());
    }

    #[test]
    fn branch_name_reflects_source_branch_and_pr() {
        let name = promotion_branch_name(7, "feature/foo", &["env/c1/".to_string()]);
        assert!(name.starts_with("promotions/7-feature-foo-"));
    }

    #[test]
    fn differing_targets_yield_differing_hashes() {
        let a = promotion_branch_name(1, "main", &["a/".to_string()]);
        let b = promotion_branch_name(1, "main", &["b/".to_string()]);
        assert_ne!(a, b);
    }
}
