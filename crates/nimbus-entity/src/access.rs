//! Result of an access-list query over a set of nodes.

use std::collections::BTreeMap;

use serde::Serialize;

/// Effective mount of a node for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessEntry {
    /// Shared node id.
    pub node_id: i64,
    /// Mount path in the account's tree.
    pub node_path: String,
}

/// Accounts with access, either as plain uids or with their mount paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AccessUsers {
    /// Uids with access through any share.
    Uids(Vec<String>),
    /// Uid to its shortest effective mount.
    Paths(BTreeMap<String, AccessEntry>),
}

/// Who can reach a set of nodes through shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessList {
    /// Accounts with access.
    pub users: AccessUsers,
    /// Whether a public link exists.
    pub public: bool,
}

impl AccessList {
    /// Uids in the list, regardless of representation.
    pub fn uids(&self) -> Vec<&str> {
        match &self.users {
            AccessUsers::Uids(uids) => uids.iter().map(String::as_str).collect(),
            AccessUsers::Paths(paths) => paths.keys().map(String::as_str).collect(),
        }
    }
}
