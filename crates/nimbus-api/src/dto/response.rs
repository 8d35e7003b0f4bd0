//! Response DTOs.

use serde::{Deserialize, Serialize};

use nimbus_entity::share::{Share, ShareAttribute};
use nimbus_entity::user::{Group, User};

/// A share as returned by the share endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareResponse {
    pub id: String,
    pub share_type: i16,
    pub uid_owner: String,
    pub uid_file_owner: String,
    pub share_with: Option<String>,
    pub share_with_displayname: Option<String>,
    pub permissions: i32,
    pub status: i16,
    pub item_type: Option<String>,
    pub file_source: Option<i64>,
    pub file_target: String,
    pub path: Option<String>,
    pub token: Option<String>,
    pub has_password: bool,
    pub expiration: Option<String>,
    pub note: String,
    pub label: Option<String>,
    pub hide_download: bool,
    pub stime: Option<i64>,
    pub parent: Option<i64>,
    pub attributes: Vec<ShareAttribute>,
}

impl From<&Share> for ShareResponse {
    fn from(share: &Share) -> Self {
        Self {
            id: share.id().unwrap_or_default().to_string(),
            share_type: share.share_type.code(),
            uid_owner: share.shared_by.clone(),
            uid_file_owner: share.share_owner.clone(),
            share_with: share.shared_with.clone(),
            share_with_displayname: share
                .shared_with_display_name
                .clone()
                .or_else(|| share.shared_with.clone()),
            permissions: share.permissions.bits(),
            status: share.status.code(),
            item_type: share.node_type().map(|t| t.as_str().to_string()),
            file_source: share.node_id(),
            file_target: share.target.clone(),
            path: share.node().map(|n| n.path.clone()),
            token: share.token.clone(),
            has_password: share.password.is_some(),
            expiration: share.expiration.map(|e| e.to_rfc3339()),
            note: share.note.clone(),
            label: share.label.clone(),
            hide_download: share.hide_download,
            stime: share.share_time.map(|t| t.timestamp()),
            parent: share.parent,
            attributes: share
                .attributes
                .as_ref()
                .map(|a| a.iter().collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub displayname: String,
    pub email: Option<String>,
    pub language: Option<String>,
    pub enabled: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.uid.clone(),
            displayname: user.display_name_or_uid().to_string(),
            email: user.email_address().map(str::to_string),
            language: user.language.clone(),
            enabled: user.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: String,
    pub displayname: String,
}

impl From<&Group> for GroupResponse {
    fn from(group: &Group) -> Self {
        Self {
            id: group.gid.clone(),
            displayname: group.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
