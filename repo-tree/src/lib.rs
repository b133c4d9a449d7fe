//! Read-only Git-object accessors: file content, directory object
//! hashes, recursive flat-mapping, and deletion tree-entry generation —
//! everything downstream crates need without ever cloning the repo.

pub mod accessor;
pub mod errors;
pub mod types;

pub use accessor::{
    fetch_directory_object_hash, fetch_file_content, flat_map_file_tree,
    generate_deletion_tree_entries,
};
pub use errors::{RtError, RtResult};
pub use types::TreeEntry;
