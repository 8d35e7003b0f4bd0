//! Share type, share status and node type enums with their persisted codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of share, persisted as a small integer in `share.share_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareType {
    /// Direct share with one account.
    User,
    /// Share with every member of a group.
    Group,
    /// Per-member override row derived from a group share.
    UserGroup,
    /// Public link share identified by a token.
    Link,
}

impl ShareType {
    /// Types visible through the provider's regular queries.
    pub const PUBLIC_TYPES: [ShareType; 3] = [ShareType::User, ShareType::Group, ShareType::Link];

    /// Persisted integer code.
    pub fn code(self) -> i16 {
        match self {
            Self::User => 0,
            Self::Group => 1,
            Self::UserGroup => 2,
            Self::Link => 3,
        }
    }

    /// Parse a persisted integer code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::User),
            1 => Some(Self::Group),
            2 => Some(Self::UserGroup),
            3 => Some(Self::Link),
            _ => None,
        }
    }
}

impl fmt::Display for ShareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
            Self::UserGroup => write!(f, "usergroup"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// Acceptance state of a received share, persisted in `share.accepted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    /// Waiting for the recipient.
    #[default]
    Pending,
    /// Accepted by the recipient.
    Accepted,
    /// Rejected by the recipient.
    Rejected,
}

impl ShareStatus {
    /// Persisted integer code.
    pub fn code(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
            Self::Rejected => 2,
        }
    }

    /// Parse a persisted code; unknown values read as pending.
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::Accepted,
            2 => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// Kind of file-system node a share points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A regular file.
    File,
    /// A directory.
    Folder,
}

impl NodeType {
    /// Value stored in `share.item_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
        }
    }

    /// Parse an `item_type` value. Only `file` and `folder` are valid.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(Self::File),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
