//! Persisted form of a share.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::attributes::ShareAttributes;
use super::kind::{ShareStatus, ShareType};

/// A row of the `share` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ShareRow {
    pub id: i64,
    pub share_type: i16,
    pub share_with: Option<String>,
    pub password: Option<String>,
    pub password_by_talk: bool,
    pub uid_owner: String,
    pub uid_initiator: Option<String>,
    pub parent: Option<i64>,
    pub item_type: String,
    pub item_source: String,
    pub file_source: Option<i64>,
    pub file_target: String,
    pub permissions: i32,
    /// Creation time as a unix timestamp.
    pub stime: i64,
    pub accepted: i16,
    pub expiration: Option<DateTime<Utc>>,
    pub token: Option<String>,
    pub mail_send: bool,
    pub note: Option<String>,
    pub label: Option<String>,
    pub hide_download: bool,
    pub reminder_sent: bool,
    /// JSON encoded attribute triples.
    pub attributes: Option<String>,
}

impl ShareRow {
    /// Decoded share type, `None` for unknown codes.
    pub fn kind(&self) -> Option<ShareType> {
        ShareType::from_code(self.share_type)
    }

    /// Decoded acceptance status.
    pub fn status(&self) -> ShareStatus {
        ShareStatus::from_code(self.accepted)
    }

    /// Creation time.
    pub fn share_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.stime, 0).single()
    }

    /// Decoded attributes. Malformed data reads as unset.
    pub fn decoded_attributes(&self) -> Option<ShareAttributes> {
        ShareAttributes::from_json(self.attributes.as_deref())
    }

    /// Number of `/` separators in the target, used to pick the shortest mount path.
    pub fn target_depth(&self) -> usize {
        self.file_target.matches('/').count()
    }
}

/// Values for a new `share` row. The id is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewShareRow {
    pub share_type: i16,
    pub share_with: Option<String>,
    pub password: Option<String>,
    pub password_by_talk: bool,
    pub uid_owner: String,
    pub uid_initiator: Option<String>,
    pub parent: Option<i64>,
    pub item_type: String,
    pub item_source: String,
    pub file_source: Option<i64>,
    pub file_target: String,
    pub permissions: i32,
    pub stime: i64,
    pub accepted: i16,
    pub expiration: Option<DateTime<Utc>>,
    pub token: Option<String>,
    pub mail_send: bool,
    pub note: Option<String>,
    pub label: Option<String>,
    pub hide_download: bool,
    pub reminder_sent: bool,
    pub attributes: Option<String>,
}

impl NewShareRow {
    /// Materialize the row once the store has assigned an id.
    pub fn into_row(self, id: i64) -> ShareRow {
        ShareRow {
            id,
            share_type: self.share_type,
            share_with: self.share_with,
            password: self.password,
            password_by_talk: self.password_by_talk,
            uid_owner: self.uid_owner,
            uid_initiator: self.uid_initiator,
            parent: self.parent,
            item_type: self.item_type,
            item_source: self.item_source,
            file_source: self.file_source,
            file_target: self.file_target,
            permissions: self.permissions,
            stime: self.stime,
            accepted: self.accepted,
            expiration: self.expiration,
            token: self.token,
            mail_send: self.mail_send,
            note: self.note,
            label: self.label,
            hide_download: self.hide_download,
            reminder_sent: self.reminder_sent,
            attributes: self.attributes,
        }
    }
}
