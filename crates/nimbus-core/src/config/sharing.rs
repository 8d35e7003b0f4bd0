//! Sharing and account enumeration policy.

use serde::{Deserialize, Serialize};

/// Sharing configuration consumed by the share provider and the principal
/// backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Master switch for the sharing API.
    #[serde(default = "default_true")]
    pub api_enabled: bool,
    /// Whether accounts may be discovered through search at all.
    #[serde(default = "default_true")]
    pub allow_share_dialog_user_enumeration: bool,
    /// Limit discovery to accounts sharing a group with the searcher.
    #[serde(default)]
    pub restrict_user_enumeration_to_group: bool,
    /// Limit discovery to accounts the searcher knows by phone number.
    #[serde(default)]
    pub restrict_user_enumeration_to_phone: bool,
    /// Allow exact matches even when enumeration is restricted.
    #[serde(default = "default_true")]
    pub restrict_user_enumeration_full_match: bool,
    /// Allow exact email matches when full matching is allowed.
    #[serde(default = "default_true")]
    pub restrict_user_enumeration_full_match_email: bool,
    /// Match display names with a trailing `" (...)"` suffix removed.
    #[serde(default)]
    pub restrict_user_enumeration_full_match_ignore_second_display_name: bool,
    /// Only allow sharing with members of one of the sharer's groups.
    #[serde(default)]
    pub only_share_with_group_members: bool,
    /// Groups ignored when computing common membership.
    #[serde(default)]
    pub only_share_with_group_members_exclude_groups: Vec<String>,
    /// Maximum number of autocomplete results, `0` or less means unlimited.
    #[serde(default = "default_max_autocomplete_results")]
    pub max_autocomplete_results: i64,
    /// Folder incoming shares are mounted into.
    #[serde(default = "default_share_folder")]
    pub share_folder: String,
    /// Whether accounts may choose their own incoming share folder.
    #[serde(default = "default_true")]
    pub allow_custom_share_folder: bool,
    /// Whether content of download-restricted shares may still be viewed.
    #[serde(default = "default_true")]
    pub allow_view_without_download: bool,
}

impl SharingConfig {
    /// Whether full-match lookups bypass disabled enumeration.
    pub fn allow_full_match(&self) -> bool {
        self.restrict_user_enumeration_full_match
    }
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            api_enabled: true,
            allow_share_dialog_user_enumeration: true,
            restrict_user_enumeration_to_group: false,
            restrict_user_enumeration_to_phone: false,
            restrict_user_enumeration_full_match: true,
            restrict_user_enumeration_full_match_email: true,
            restrict_user_enumeration_full_match_ignore_second_display_name: false,
            only_share_with_group_members: false,
            only_share_with_group_members_exclude_groups: Vec::new(),
            max_autocomplete_results: default_max_autocomplete_results(),
            share_folder: default_share_folder(),
            allow_custom_share_folder: true,
            allow_view_without_download: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_autocomplete_results() -> i64 {
    25
}

fn default_share_folder() -> String {
    "/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let parsed: SharingConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.api_enabled);
        assert_eq!(parsed.max_autocomplete_results, 25);
        assert_eq!(parsed.share_folder, "/");
        assert!(parsed.allow_full_match());
        assert!(!parsed.only_share_with_group_members);
    }
}
