//! Share value object.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use nimbus_core::error::{AppError, ErrorKind};

use super::attributes::ShareAttributes;
use super::kind::{NodeType, ShareStatus, ShareType};
use super::permissions::Permissions;
use crate::node::Node;

/// Errors raised by share invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShareError {
    /// The share id was already assigned.
    #[error("Not allowed to assign a new internal id to a share")]
    IllegalIdChange,
    /// The provider id was already assigned.
    #[error("Not allowed to assign a new provider id to a share")]
    IllegalProviderIdChange,
    /// `full_id` requested before both ids were assigned.
    #[error("Share is missing its {0}")]
    Incomplete(&'static str),
    /// Node type other than `file` or `folder`.
    #[error("Node type must be file or folder, got {0}")]
    InvalidNodeType(String),
}

impl From<ShareError> for AppError {
    fn from(err: ShareError) -> Self {
        let kind = match err {
            ShareError::IllegalIdChange | ShareError::IllegalProviderIdChange => {
                ErrorKind::IllegalIdChange
            }
            ShareError::Incomplete(_) => ErrorKind::Internal,
            ShareError::InvalidNodeType(_) => ErrorKind::Validation,
        };
        AppError::new(kind, err.to_string())
    }
}

/// One share as handled by the share provider.
///
/// `id` and `provider_id` are assigned once, by the provider, when the
/// share is persisted or loaded.
#[derive(Debug, Clone, Serialize)]
pub struct Share {
    id: Option<String>,
    provider_id: Option<String>,
    node_id: Option<i64>,
    #[serde(skip)]
    node: Option<Node>,
    node_type: Option<NodeType>,
    /// Share type.
    pub share_type: ShareType,
    /// Recipient uid or gid. Unused for link shares.
    pub shared_with: Option<String>,
    /// Display name of the recipient.
    pub shared_with_display_name: Option<String>,
    /// Account that created the share.
    pub shared_by: String,
    /// Account owning the shared node.
    pub share_owner: String,
    /// Permission bitmask.
    pub permissions: Permissions,
    /// Fine-grained attributes, `None` when unset.
    #[serde(skip)]
    pub attributes: Option<ShareAttributes>,
    /// Acceptance state.
    pub status: ShareStatus,
    /// Note shown to recipients.
    pub note: String,
    /// Expiration timestamp.
    pub expiration: Option<DateTime<Utc>>,
    /// Explicitly created without expiration.
    pub no_expiration_date: bool,
    /// Link password hash.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Link password expiry.
    pub password_expiration_time: Option<DateTime<Utc>>,
    /// Send the link password through the talk backend.
    pub send_password_by_talk: bool,
    /// Link token.
    pub token: Option<String>,
    /// Link label.
    pub label: Option<String>,
    /// Parent share id.
    pub parent: Option<i64>,
    /// Mount path in the recipient's tree.
    pub target: String,
    /// Creation time.
    pub share_time: Option<DateTime<Utc>>,
    /// Whether a notification mail should be sent on creation.
    pub mail_send: bool,
    /// Hide the download button on public pages.
    pub hide_download: bool,
    /// Whether the expiry reminder was sent.
    pub reminder_sent: bool,
}

impl Share {
    /// Create an empty share of the given type.
    pub fn new(share_type: ShareType) -> Self {
        Self {
            id: None,
            provider_id: None,
            node_id: None,
            node: None,
            node_type: None,
            share_type,
            shared_with: None,
            shared_with_display_name: None,
            shared_by: String::new(),
            share_owner: String::new(),
            permissions: Permissions::NONE,
            attributes: None,
            status: ShareStatus::Pending,
            note: String::new(),
            expiration: None,
            no_expiration_date: false,
            password: None,
            password_expiration_time: None,
            send_password_by_talk: false,
            token: None,
            label: None,
            parent: None,
            target: String::new(),
            share_time: None,
            mail_send: true,
            hide_download: false,
            reminder_sent: false,
        }
    }

    /// Assign the share id. The value is trimmed; a second assignment fails.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<&mut Self, ShareError> {
        if self.id.is_some() {
            return Err(ShareError::IllegalIdChange);
        }
        self.id = Some(id.into().trim().to_string());
        Ok(self)
    }

    /// Share id, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Numeric share id, if assigned and numeric.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.as_deref().and_then(|id| id.parse().ok())
    }

    /// Assign the provider id. A second assignment fails.
    pub fn set_provider_id(&mut self, id: impl Into<String>) -> Result<&mut Self, ShareError> {
        if self.provider_id.is_some() {
            return Err(ShareError::IllegalProviderIdChange);
        }
        self.provider_id = Some(id.into().trim().to_string());
        Ok(self)
    }

    /// Provider id, if assigned.
    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    /// `"<provider>:<id>"`.
    pub fn full_id(&self) -> Result<String, ShareError> {
        let provider = self
            .provider_id
            .as_deref()
            .ok_or(ShareError::Incomplete("provider id"))?;
        let id = self.id.as_deref().ok_or(ShareError::Incomplete("id"))?;
        Ok(format!("{provider}:{id}"))
    }

    /// Attach a resolved node. Also sets the node id and type.
    pub fn set_node(&mut self, node: Node) -> &mut Self {
        self.node_id = Some(node.id);
        self.node_type = Some(node.node_type);
        self.node = Some(node);
        self
    }

    /// Point the share at a node id, dropping any resolved node.
    pub fn set_node_id(&mut self, node_id: i64) -> &mut Self {
        self.node = None;
        self.node_id = Some(node_id);
        self
    }

    /// Node id, from the resolved node when present.
    pub fn node_id(&self) -> Option<i64> {
        self.node.as_ref().map(|n| n.id).or(self.node_id)
    }

    /// Resolved node, if any.
    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// Set the node type from its persisted name.
    pub fn set_node_type(&mut self, node_type: &str) -> Result<&mut Self, ShareError> {
        let parsed = NodeType::parse(node_type)
            .ok_or_else(|| ShareError::InvalidNodeType(node_type.to_string()))?;
        self.node_type = Some(parsed);
        Ok(self)
    }

    /// Node type, from the resolved node when present.
    pub fn node_type(&self) -> Option<NodeType> {
        self.node.as_ref().map(|n| n.node_type).or(self.node_type)
    }

    /// Whether the expiration date has passed.
    pub fn is_expired(&self) -> bool {
        self.expiration.is_some_and(|exp| exp <= Utc::now())
    }

    /// Whether recipients may see the content.
    ///
    /// Content is visible unless downloads are forbidden through the
    /// `permissions/download` attribute and viewing without download is
    /// disallowed.
    pub fn can_see_content(&self, allow_view_without_download: bool) -> bool {
        if allow_view_without_download {
            return true;
        }
        let download = self
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get("permissions", "download"));
        !matches!(download, Some(serde_json::Value::Bool(false)))
    }
}
