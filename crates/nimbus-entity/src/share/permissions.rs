//! Share permission bitmask.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

/// Permission bitmask carried by a share, persisted in `share.permissions`.
///
/// A value of zero on a user-group override row means the member removed
/// the share for themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(i32);

impl Permissions {
    /// No permissions at all.
    pub const NONE: Self = Self(0);
    /// Read the node.
    pub const READ: Self = Self(1);
    /// Modify the node.
    pub const UPDATE: Self = Self(2);
    /// Create children inside a folder.
    pub const CREATE: Self = Self(4);
    /// Delete the node or its children.
    pub const DELETE: Self = Self(8);
    /// Re-share the node.
    pub const SHARE: Self = Self(16);
    /// Every permission.
    pub const ALL: Self = Self(31);

    /// Build from a raw persisted value.
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw persisted value.
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Whether no permission bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
