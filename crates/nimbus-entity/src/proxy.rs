//! Calendar proxy delegations between principals.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Delegate may read the owner's calendars.
pub const PROXY_PERMISSION_READ: i32 = 1;
/// Delegate may read and write the owner's calendars.
pub const PROXY_PERMISSION_WRITE: i32 = 2;

/// One delegation from `owner_id` to `proxy_id`, both principal URIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Proxy {
    pub id: i64,
    pub owner_id: String,
    pub proxy_id: String,
    pub permissions: i32,
}

impl Proxy {
    /// Unsaved delegation.
    pub fn new(owner_id: impl Into<String>, proxy_id: impl Into<String>, permissions: i32) -> Self {
        Self {
            id: 0,
            owner_id: owner_id.into(),
            proxy_id: proxy_id.into(),
            permissions,
        }
    }

    pub fn is_read(&self) -> bool {
        self.permissions == PROXY_PERMISSION_READ
    }

    pub fn is_write(&self) -> bool {
        self.permissions == PROXY_PERMISSION_WRITE
    }
}
