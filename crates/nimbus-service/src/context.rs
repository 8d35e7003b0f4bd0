//! Request context carrying the authenticated account.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The account acting in the current request.
///
/// Built by the HTTP layer after authentication and passed into service
/// calls that depend on who is acting.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    /// Authenticated uid.
    pub uid: String,
    /// Whether the account belongs to the `admin` group.
    pub is_admin: bool,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(uid: impl Into<String>, is_admin: bool) -> Self {
        Self {
            uid: uid.into(),
            is_admin,
            request_time: Utc::now(),
        }
    }
}
