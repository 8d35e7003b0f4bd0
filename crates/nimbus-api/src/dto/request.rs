//! Request DTOs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use nimbus_entity::share::ShareAttribute;

/// POST /shares
#[derive(Debug, Clone, Deserialize)]
pub struct CreateShareRequest {
    /// File id of the node to share.
    pub file_id: i64,
    /// Persisted share type code: 0 user, 1 group, 3 link.
    pub share_type: i16,
    /// Recipient uid or gid; ignored for link shares.
    pub share_with: Option<String>,
    /// Permission bitmask, defaults to read.
    pub permissions: Option<i32>,
    /// Plain-text link password, hashed before it is stored.
    pub password: Option<String>,
    pub expire_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: String,
    pub label: Option<String>,
    #[serde(default)]
    pub hide_download: bool,
    pub attributes: Option<Vec<ShareAttribute>>,
    /// Mail user share recipients, defaults to on.
    pub send_mail: Option<bool>,
}

/// PUT /shares/{id}. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateShareRequest {
    pub permissions: Option<i32>,
    /// An empty string removes the password.
    pub password: Option<String>,
    pub expire_date: Option<DateTime<Utc>>,
    /// Clear the expiration date.
    #[serde(default)]
    pub remove_expire_date: bool,
    pub note: Option<String>,
    pub label: Option<String>,
    pub hide_download: Option<bool>,
    pub attributes: Option<Vec<ShareAttribute>>,
}

/// GET /shares query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSharesQuery {
    /// List shares received instead of shares created.
    #[serde(default)]
    pub shared_with_me: bool,
    /// Restrict to one node.
    pub file_id: Option<i64>,
    /// Include shares on the caller's nodes created by others.
    #[serde(default)]
    pub reshares: bool,
}

/// POST /cloud/groups
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupRequest {
    pub gid: String,
    pub display_name: Option<String>,
}

/// POST /cloud/users/{uid}/groups
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMembershipRequest {
    pub gid: String,
}
