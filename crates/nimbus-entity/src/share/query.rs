//! Typed row filters and column updates for the `share` table.
//!
//! Share stores translate a [`ShareFilter`] into a `WHERE` clause and a
//! [`ShareChanges`] into a `SET` list. The in-memory store evaluates them
//! directly through [`ShareFilter::matches`] and [`ShareChanges::apply`],
//! so both backends share one definition of the semantics.

use chrono::{DateTime, Utc};

use super::kind::{ShareStatus, ShareType};
use super::row::ShareRow;

/// Predicate on the owner and initiator columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    /// `uid_owner = uid`
    Owner(String),
    /// `uid_initiator = uid`
    Initiator(String),
    /// `uid_owner = uid OR uid_initiator = uid`
    OwnerOrInitiator(String),
}

/// Conjunction of column predicates. Unset fields do not constrain.
///
/// Results are always ordered by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareFilter {
    pub id: Option<i64>,
    pub share_types: Vec<ShareType>,
    pub share_with: Option<String>,
    pub share_with_in: Option<Vec<String>>,
    pub user: Option<UserFilter>,
    pub parent: Option<i64>,
    pub parent_in: Option<Vec<i64>>,
    pub file_source: Option<i64>,
    pub file_source_in: Option<Vec<i64>>,
    pub token: Option<String>,
    /// Only rows with `permissions <> 0`.
    pub nonzero_permissions: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ShareFilter {
    /// Filter matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn share_types(mut self, types: &[ShareType]) -> Self {
        self.share_types = types.to_vec();
        self
    }

    pub fn share_type(self, ty: ShareType) -> Self {
        self.share_types(&[ty])
    }

    pub fn share_with(mut self, recipient: impl Into<String>) -> Self {
        self.share_with = Some(recipient.into());
        self
    }

    pub fn share_with_in(mut self, recipients: Vec<String>) -> Self {
        self.share_with_in = Some(recipients);
        self
    }

    pub fn user(mut self, filter: UserFilter) -> Self {
        self.user = Some(filter);
        self
    }

    pub fn parent(mut self, parent: i64) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn parent_in(mut self, parents: Vec<i64>) -> Self {
        self.parent_in = Some(parents);
        self
    }

    pub fn file_source(mut self, file_id: i64) -> Self {
        self.file_source = Some(file_id);
        self
    }

    pub fn file_source_in(mut self, file_ids: Vec<i64>) -> Self {
        self.file_source_in = Some(file_ids);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn nonzero_permissions(mut self) -> Self {
        self.nonzero_permissions = true;
        self
    }

    /// Page the result. A negative limit means unlimited.
    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = (limit >= 0).then_some(limit);
        self.offset = (offset > 0).then_some(offset);
        self
    }

    /// Evaluate the predicates against one row. Paging is not considered.
    pub fn matches(&self, row: &ShareRow) -> bool {
        if self.id.is_some_and(|id| id != row.id) {
            return false;
        }
        if !self.share_types.is_empty()
            && !self.share_types.iter().any(|t| t.code() == row.share_type)
        {
            return false;
        }
        if let Some(with) = &self.share_with {
            if row.share_with.as_deref() != Some(with.as_str()) {
                return false;
            }
        }
        if let Some(list) = &self.share_with_in {
            match &row.share_with {
                Some(with) if list.contains(with) => {}
                _ => return false,
            }
        }
        if let Some(user) = &self.user {
            let initiator = row.uid_initiator.as_deref();
            let ok = match user {
                UserFilter::Owner(uid) => row.uid_owner == *uid,
                UserFilter::Initiator(uid) => initiator == Some(uid.as_str()),
                UserFilter::OwnerOrInitiator(uid) => {
                    row.uid_owner == *uid || initiator == Some(uid.as_str())
                }
            };
            if !ok {
                return false;
            }
        }
        if self.parent.is_some() && self.parent != row.parent {
            return false;
        }
        if let Some(parents) = &self.parent_in {
            if !row.parent.is_some_and(|p| parents.contains(&p)) {
                return false;
            }
        }
        if self.file_source.is_some() && self.file_source != row.file_source {
            return false;
        }
        if let Some(sources) = &self.file_source_in {
            if !row.file_source.is_some_and(|f| sources.contains(&f)) {
                return false;
            }
        }
        if let Some(token) = &self.token {
            if row.token.as_deref() != Some(token.as_str()) {
                return false;
            }
        }
        if self.nonzero_permissions && row.permissions == 0 {
            return false;
        }
        true
    }
}

/// Column assignments. `None` leaves a column untouched; nullable columns
/// use `Some(None)` to write `NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareChanges {
    pub share_with: Option<Option<String>>,
    pub uid_owner: Option<String>,
    pub uid_initiator: Option<Option<String>>,
    pub item_source: Option<String>,
    pub file_source: Option<Option<i64>>,
    pub file_target: Option<String>,
    pub permissions: Option<i32>,
    pub attributes: Option<Option<String>>,
    pub accepted: Option<i16>,
    pub expiration: Option<Option<DateTime<Utc>>>,
    pub note: Option<Option<String>>,
    pub label: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub password_by_talk: Option<bool>,
    pub token: Option<Option<String>>,
    pub hide_download: Option<bool>,
    pub reminder_sent: Option<bool>,
    pub mail_send: Option<bool>,
}

impl ShareChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissions(mut self, permissions: i32) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn accepted(mut self, status: ShareStatus) -> Self {
        self.accepted = Some(status.code());
        self
    }

    pub fn file_target(mut self, target: impl Into<String>) -> Self {
        self.file_target = Some(target.into());
        self
    }

    pub fn attributes(mut self, attributes: Option<String>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Whether no column is assigned.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the assignments to a row in place.
    pub fn apply(&self, row: &mut ShareRow) {
        if let Some(v) = &self.share_with {
            row.share_with = v.clone();
        }
        if let Some(v) = &self.uid_owner {
            row.uid_owner = v.clone();
        }
        if let Some(v) = &self.uid_initiator {
            row.uid_initiator = v.clone();
        }
        if let Some(v) = &self.item_source {
            row.item_source = v.clone();
        }
        if let Some(v) = self.file_source {
            row.file_source = v;
        }
        if let Some(v) = &self.file_target {
            row.file_target = v.clone();
        }
        if let Some(v) = self.permissions {
            row.permissions = v;
        }
        if let Some(v) = &self.attributes {
            row.attributes = v.clone();
        }
        if let Some(v) = self.accepted {
            row.accepted = v;
        }
        if let Some(v) = self.expiration {
            row.expiration = v;
        }
        if let Some(v) = &self.note {
            row.note = v.clone();
        }
        if let Some(v) = &self.label {
            row.label = v.clone();
        }
        if let Some(v) = &self.password {
            row.password = v.clone();
        }
        if let Some(v) = self.password_by_talk {
            row.password_by_talk = v;
        }
        if let Some(v) = &self.token {
            row.token = v.clone();
        }
        if let Some(v) = self.hide_download {
            row.hide_download = v;
        }
        if let Some(v) = self.reminder_sent {
            row.reminder_sent = v;
        }
        if let Some(v) = self.mail_send {
            row.mail_send = v;
        }
    }
}
