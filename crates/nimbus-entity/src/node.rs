//! File-system node references resolved from the file cache.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::share::NodeType;

/// Prefix of storage ids backing an account's home directory.
pub const HOME_STORAGE_PREFIX: &str = "home::";

/// Prefix of object-store home storages.
pub const OBJECT_HOME_STORAGE_PREFIX: &str = "object::user:";

/// A file cache entry, the node a share points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// File id, referenced by `share.file_source`.
    pub id: i64,
    /// Parent folder id, `None` for a storage root.
    pub parent_id: Option<i64>,
    /// Base name.
    pub name: String,
    /// Path inside the storage, for home storages starting with `files/`.
    pub path: String,
    /// Storage identifier, e.g. `home::alice`.
    pub storage_id: String,
    /// File or folder.
    pub node_type: NodeType,
    /// Account owning the storage.
    pub owner: String,
}

impl Node {
    /// Whether this node lives on an account home storage.
    pub fn is_home_storage(&self) -> bool {
        self.storage_id.starts_with(HOME_STORAGE_PREFIX)
            || self.storage_id.starts_with(OBJECT_HOME_STORAGE_PREFIX)
    }

    /// Whether a share on this node may be surfaced to recipients.
    ///
    /// Home storage entries outside `files/` (trash bin, versions) and
    /// group-folder trash are not accessible.
    pub fn is_accessible(&self) -> bool {
        if self.is_home_storage() && self.path.split('/').next() != Some("files") {
            return false;
        }
        !self.path.starts_with("__groupfolders/trash/")
    }
}

/// Raw `filecache` row.
#[derive(Debug, Clone, FromRow)]
pub struct NodeRow {
    pub fileid: i64,
    pub parent: Option<i64>,
    pub name: String,
    pub path: String,
    pub storage_id: String,
    pub is_folder: bool,
    pub owner: String,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.fileid,
            parent_id: row.parent,
            name: row.name,
            path: row.path,
            storage_id: row.storage_id,
            node_type: if row.is_folder {
                NodeType::Folder
            } else {
                NodeType::File
            },
            owner: row.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(storage: &str, path: &str) -> Node {
        Node {
            id: 1,
            parent_id: None,
            name: "x".into(),
            path: path.into(),
            storage_id: storage.into(),
            node_type: NodeType::File,
            owner: "alice".into(),
        }
    }

    #[test]
    fn test_accessibility_rules() {
        assert!(node("home::alice", "files/report.pdf").is_accessible());
        assert!(!node("home::alice", "files_trashbin/files/report.pdf").is_accessible());
        assert!(!node("home::alice", "files_versions/report.pdf").is_accessible());
        assert!(!node("home::alice", "files_trashbin/files/old.txt.d1700000000").is_accessible());
        assert!(!node("object::user:alice", "files_versions/report.pdf").is_accessible());
        assert!(node("object::user:alice", "files/report.pdf").is_accessible());
        assert!(node("local::/srv", "media/a.png").is_accessible());
        assert!(!node("local::/srv", "__groupfolders/trash/1/a.png").is_accessible());
    }
}
