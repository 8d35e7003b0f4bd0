//! Notification mail configuration.

use serde::{Deserialize, Serialize};

/// Settings used when rendering and addressing notification mails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Whether notification mails are sent at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sender address for system mails.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Instance name shown in the sender display name and footer.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Footer slogan.
    #[serde(default = "default_slogan")]
    pub slogan: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            from_address: default_from_address(),
            instance_name: default_instance_name(),
            slogan: default_slogan(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_instance_name() -> String {
    "Nimbus".to_string()
}

fn default_slogan() -> String {
    "a safe home for all your data".to_string()
}
