//! Pull-request context: the data model every downstream crate threads
//! through a promotion or drift-detection run.
//!
//! Fields that require a network round-trip (`default_branch`, `head_sha`)
//! are populated lazily and cached for the lifetime of the context,
//! fetched once and reused for the rest of the request.

use tokio::sync::OnceCell;

use crate::client::ClientPair;
use crate::errors::GhResult;
use crate::metadata::PrMetadata;

/// Everything a handler needs to act on one pull request, bound to one
/// GitHub principal.
#[derive(Clone)]
pub struct PrContext {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub head_ref: String,
    pub head_sha: String,
    pub author: String,
    pub labels: Vec<String>,
    pub client: ClientPair,
    default_branch: OnceCell<String>,
    pub metadata: Option<PrMetadata>,
}

impl PrContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        pr_number: u64,
        head_ref: impl Into<String>,
        head_sha: impl Into<String>,
        author: impl Into<String>,
        labels: Vec<String>,
        client: ClientPair,
        body: &str,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            pr_number,
            head_ref: head_ref.into(),
            head_sha: head_sha.into(),
            author: author.into(),
            labels,
            client,
            default_branch: OnceCell::new(),
            metadata: PrMetadata::from_body(body),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    /// Fetches and caches the repository's default branch name.
    pub async fn default_branch(&self) -> GhResult<&str> {
        self.default_branch
            .get_or_try_init(|| async {
                #[derive(serde::Deserialize)]
                struct RepoMeta {
                    default_branch: String,
                }
                let meta: RepoMeta = self
                    .client
                    .rest
                    .get_json(&format!("/repos/{}/{}", self.owner, self.repo))
                    .await?
                    .ok_or_else(|| crate::errors::GhError::Api {
                        status: 404,
                        body: format!("repo {}/{} not found", self.owner, self.repo),
                    })?;
                Ok(meta.default_branch)
            })
            .await
            .map(String::as_str)
    }

    /// `owner/repo#number`, used in log fields and aggregation keys.
    pub fn slug(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.pr_number)
    }
}
