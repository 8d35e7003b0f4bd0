//! Accounts and groups.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique account id.
    pub uid: String,
    /// Display name, may be empty.
    pub display_name: String,
    /// Primary email address.
    pub email: Option<String>,
    /// Additional verified email addresses.
    pub additional_emails: Vec<String>,
    /// Preferred language code.
    pub language: Option<String>,
    /// Custom folder for incoming shares.
    pub share_folder: Option<String>,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Whether the account may log in.
    pub enabled: bool,
}

impl User {
    /// Enabled account with no profile data.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: String::new(),
            email: None,
            additional_emails: Vec::new(),
            language: None,
            share_folder: None,
            password_hash: None,
            enabled: true,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Display name, falling back to the uid when unset.
    pub fn display_name_or_uid(&self) -> &str {
        if self.display_name.is_empty() {
            &self.uid
        } else {
            &self.display_name
        }
    }

    /// Primary email when present and non-empty.
    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }
}

/// A group of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Group {
    /// Unique group id.
    pub gid: String,
    /// Display name.
    pub display_name: String,
    /// Hidden from sharing and principal membership listings.
    pub hide_from_collaboration: bool,
}

impl Group {
    /// Visible group whose display name is its id.
    pub fn new(gid: impl Into<String>) -> Self {
        let gid = gid.into();
        Self {
            display_name: gid.clone(),
            gid,
            hide_from_collaboration: false,
        }
    }
}
