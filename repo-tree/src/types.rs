use serde::{Deserialize, Serialize};

/// One entry of the low-level Git tree API. `sha: None` serializes to a
/// JSON `null`, which is how the API expresses a deletion — this must
/// stay an `Option`, never a `#[serde(skip_serializing_if)]` field, or
/// deletions would silently stop being sent.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sha: Option<String>,
}

impl TreeEntry {
    pub fn subtree(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "040000",
            kind: "tree",
            sha: Some(sha.into()),
        }
    }

    pub fn delete_blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644",
            kind: "blob",
            sha: None,
        }
    }

    /// References an already-created blob object (`git/blobs`) at `path`.
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644",
            kind: "blob",
            sha: Some(sha.into()),
        }
    }
}

/// Deserialization shape of one entry returned by the "contents" API when
/// the queried path is a directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub fn is_dir(entry: &ContentsEntry) -> bool {
    entry.kind == "dir"
}

pub fn is_file(entry: &ContentsEntry) -> bool {
    entry.kind == "file"
}
