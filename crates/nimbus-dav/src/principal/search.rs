//! Principal property search under the account enumeration policy.

use nimbus_core::result::AppResult;
use nimbus_entity::user::User;

use super::backend::{PrincipalBackend, Restriction};
use super::uri::USERS_PREFIX;
use super::{PROP_CALENDAR_USER_ADDRESS_SET, PROP_DISPLAYNAME, PROP_EMAIL_ADDRESS};

/// How per-property result sets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchTest {
    /// Principals matching every property.
    #[default]
    AllOf,
    /// Principals matching any property.
    AnyOf,
}

impl SearchTest {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("anyof") {
            Self::AnyOf
        } else {
            Self::AllOf
        }
    }
}

impl PrincipalBackend {
    /// Principal URIs under `prefix` matching the searched properties.
    ///
    /// Only `principals/users` is searchable.
    pub async fn search_principals(
        &self,
        prefix: &str,
        properties: &[(String, String)],
        test: SearchTest,
    ) -> AppResult<Vec<String>> {
        if properties.is_empty() {
            return Ok(Vec::new());
        }
        if prefix.trim_matches('/') == USERS_PREFIX {
            self.search_user_principals(properties, test).await
        } else {
            Ok(Vec::new())
        }
    }

    /// Account principals matching `{DAV:}displayname`, the sabre
    /// `email-address` or the CalDAV `calendar-user-address-set`.
    ///
    /// Candidates are found per property, filtered by the enumeration
    /// policy and the group restriction, then intersected or united.
    /// Unknown properties match nothing.
    pub async fn search_user_principals(
        &self,
        properties: &[(String, String)],
        test: SearchTest,
    ) -> AppResult<Vec<String>> {
        if !self.sharing.api_enabled {
            return Ok(Vec::new());
        }
        let restrict_groups = match self.restricting_groups().await? {
            Restriction::Denied => return Ok(Vec::new()),
            Restriction::Groups(groups) => Some(groups),
            Restriction::None => None,
        };
        let searcher_groups = match (&self.current_user, self.sharing.restrict_user_enumeration_to_group) {
            (Some(uid), true) => self.groups.user_group_ids(uid).await?,
            _ => Vec::new(),
        };

        let mut results: Vec<Vec<String>> = Vec::with_capacity(properties.len());
        for (name, value) in properties {
            let candidates = match name.as_str() {
                // A calendar user address is searched as an email address.
                PROP_EMAIL_ADDRESS | PROP_CALENDAR_USER_ADDRESS_SET => {
                    self.email_candidates(value, &searcher_groups).await?
                }
                PROP_DISPLAYNAME => self.display_name_candidates(value, &searcher_groups).await?,
                _ => {
                    results.push(Vec::new());
                    continue;
                }
            };

            let mut uris = Vec::new();
            for user in candidates {
                if let Some(restrict) = &restrict_groups {
                    if !self.shares_group(&user.uid, restrict).await? {
                        continue;
                    }
                }
                uris.push(format!("{}/{}", self.principal_prefix, user.uid));
            }
            results.push(uris);
        }

        if results.len() == 1 {
            return Ok(results.remove(0));
        }
        Ok(match test {
            SearchTest::AnyOf => {
                let mut merged: Vec<String> = Vec::new();
                for uri in results.into_iter().flatten() {
                    if !merged.contains(&uri) {
                        merged.push(uri);
                    }
                }
                merged
            }
            SearchTest::AllOf => {
                let mut sets = results.into_iter();
                let first = sets.next().unwrap_or_default();
                let rest: Vec<Vec<String>> = sets.collect();
                first
                    .into_iter()
                    .filter(|uri| rest.iter().all(|set| set.contains(uri)))
                    .collect()
            }
        })
    }

    async fn email_candidates(&self, value: &str, searcher_groups: &[String]) -> AppResult<Vec<User>> {
        let sharing = &self.sharing;
        if !sharing.allow_share_dialog_user_enumeration {
            if sharing.allow_full_match() && sharing.restrict_user_enumeration_full_match_email {
                return self.users.get_by_email(value).await;
            }
            return Ok(Vec::new());
        }

        let mut allowed = Vec::new();
        for user in self.users.get_by_email(value).await? {
            let exact = sharing.allow_full_match() && user.email_address() == Some(value);
            if exact || self.enumerable(&user, searcher_groups).await? {
                allowed.push(user);
            }
        }
        Ok(allowed)
    }

    async fn display_name_candidates(
        &self,
        value: &str,
        searcher_groups: &[String],
    ) -> AppResult<Vec<User>> {
        let sharing = &self.sharing;
        let limit = (sharing.max_autocomplete_results > 0)
            .then_some(sharing.max_autocomplete_results as usize);

        if !sharing.allow_share_dialog_user_enumeration {
            if !sharing.allow_full_match() {
                return Ok(Vec::new());
            }
            let wanted = value.to_lowercase();
            let ignore_second =
                sharing.restrict_user_enumeration_full_match_ignore_second_display_name;
            return Ok(self
                .users
                .search_display_name(value, limit)
                .await?
                .into_iter()
                .filter(|user| {
                    let name = user.display_name_or_uid().to_lowercase();
                    name == wanted
                        || (ignore_second && strip_second_display_name(&name).trim() == wanted)
                })
                .collect());
        }

        let mut allowed = Vec::new();
        for user in self.users.search_display_name(value, limit).await? {
            let exact = sharing.allow_full_match() && user.display_name_or_uid() == value;
            if exact || self.enumerable(&user, searcher_groups).await? {
                allowed.push(user);
            }
        }
        Ok(allowed)
    }

    /// Whether enumeration restrictions let the acting account see `user`.
    async fn enumerable(&self, user: &User, searcher_groups: &[String]) -> AppResult<bool> {
        let sharing = &self.sharing;
        if sharing.restrict_user_enumeration_to_phone {
            if let Some(current) = &self.current_user {
                if self.known_users.is_known_to_user(current, &user.uid).await? {
                    return Ok(true);
                }
            }
        }
        if !sharing.restrict_user_enumeration_to_group {
            return Ok(true);
        }
        if searcher_groups.is_empty() {
            return Ok(false);
        }
        self.shares_group(&user.uid, searcher_groups).await
    }
}

/// Drop a trailing ` (...)` suffix, as in `jane doe (sales)`.
fn strip_second_display_name(name: &str) -> &str {
    if !name.ends_with(')') {
        return name;
    }
    match name.find(" (") {
        Some(idx) => &name[..idx],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nimbus_core::config::sharing::SharingConfig;
    use nimbus_database::memory::{MemoryDirectory, MemoryProxyStore};
    use nimbus_database::traits::{GroupBackend, UserBackend};
    use nimbus_service::{Backends, L10nFactory};

    use super::*;
    use crate::principal::NoCircles;

    fn email(uid: &str) -> (String, String) {
        (PROP_EMAIL_ADDRESS.to_string(), format!("{uid}@example.org"))
    }

    fn name(value: &str) -> (String, String) {
        (PROP_DISPLAYNAME.to_string(), value.to_string())
    }

    async fn directory() -> (Backends, Arc<MemoryDirectory>) {
        let (backends, directory, _) = Backends::memory();
        for (uid, display) in [
            ("alice", "Alice"),
            ("alina", "Alina (Sales)"),
            ("bob", "Bob"),
        ] {
            let user = User::new(uid)
                .with_display_name(display)
                .with_email(format!("{uid}@example.org"));
            UserBackend::save(directory.as_ref(), &user).await.unwrap();
        }
        directory.add_member("staff", "alice").await.unwrap();
        directory.add_member("staff", "alina").await.unwrap();
        directory.add_member("other", "bob").await.unwrap();
        (backends, directory)
    }

    fn backend(backends: &Backends, sharing: SharingConfig) -> PrincipalBackend {
        PrincipalBackend::new(
            backends,
            Arc::new(MemoryProxyStore::new()),
            Arc::new(NoCircles),
            sharing,
            false,
            L10nFactory::new(),
        )
        .for_user(Some("alice"))
    }

    #[tokio::test]
    async fn test_open_enumeration() {
        let (backends, _) = directory().await;
        let backend = backend(&backends, SharingConfig::default());

        assert_eq!(
            backend
                .search_principals("principals/users", &[name("ali")], SearchTest::AllOf)
                .await
                .unwrap(),
            vec!["principals/users/alice", "principals/users/alina"]
        );
        assert_eq!(
            backend
                .search_principals("principals/users", &[email("bob")], SearchTest::AllOf)
                .await
                .unwrap(),
            vec!["principals/users/bob"]
        );
        assert!(backend
            .search_principals("principals/groups", &[name("ali")], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());
        assert!(backend
            .search_principals("principals/users", &[], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_all_of_and_any_of() {
        let (backends, _) = directory().await;
        let backend = backend(&backends, SharingConfig::default());
        let props = [name("ali"), email("alina")];

        assert_eq!(
            backend.search_user_principals(&props, SearchTest::AllOf).await.unwrap(),
            vec!["principals/users/alina"]
        );
        assert_eq!(
            backend.search_user_principals(&props, SearchTest::AnyOf).await.unwrap(),
            vec!["principals/users/alice", "principals/users/alina"]
        );
        let with_unknown = [name("ali"), ("{urn:x}unknown".to_string(), "x".to_string())];
        assert!(backend
            .search_user_principals(&with_unknown, SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_disabled_enumeration_without_full_match_finds_nothing() {
        let (backends, _) = directory().await;
        let sharing = SharingConfig {
            allow_share_dialog_user_enumeration: false,
            restrict_user_enumeration_full_match: false,
            ..SharingConfig::default()
        };
        let backend = backend(&backends, sharing);

        for props in [
            vec![name("Alice")],
            vec![email("alice")],
            vec![(
                PROP_CALENDAR_USER_ADDRESS_SET.to_string(),
                "alice@example.org".to_string(),
            )],
        ] {
            assert!(backend
                .search_user_principals(&props, SearchTest::AnyOf)
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn test_disabled_enumeration_allows_full_match() {
        let (backends, _) = directory().await;
        let sharing = SharingConfig {
            allow_share_dialog_user_enumeration: false,
            ..SharingConfig::default()
        };
        let backend = backend(&backends, sharing.clone());

        assert!(backend
            .search_user_principals(&[name("ali")], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            backend
                .search_user_principals(&[name("alice")], SearchTest::AllOf)
                .await
                .unwrap(),
            vec!["principals/users/alice"]
        );
        assert!(backend
            .search_user_principals(&[name("alina")], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());

        let backend = self::backend(
            &backends,
            SharingConfig {
                restrict_user_enumeration_full_match_ignore_second_display_name: true,
                ..sharing
            },
        );
        assert_eq!(
            backend
                .search_user_principals(&[name("alina")], SearchTest::AllOf)
                .await
                .unwrap(),
            vec!["principals/users/alina"]
        );
    }

    #[tokio::test]
    async fn test_group_limited_enumeration() {
        let (backends, directory) = directory().await;
        let sharing = SharingConfig {
            restrict_user_enumeration_to_group: true,
            restrict_user_enumeration_full_match: false,
            ..SharingConfig::default()
        };
        let backend = backend(&backends, sharing.clone());
        assert!(backend
            .search_user_principals(&[name("bo")], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());

        let sharing = SharingConfig {
            restrict_user_enumeration_to_phone: true,
            ..sharing
        };
        directory.add_known_user("alice", "bob").await;
        let backend = self::backend(&backends, sharing);
        assert_eq!(
            backend
                .search_user_principals(&[name("bo")], SearchTest::AllOf)
                .await
                .unwrap(),
            vec!["principals/users/bob"]
        );
    }

    #[tokio::test]
    async fn test_share_with_group_members_only() {
        let (backends, _) = directory().await;
        let sharing = SharingConfig {
            only_share_with_group_members: true,
            ..SharingConfig::default()
        };
        let backend = backend(&backends, sharing.clone());
        assert!(backend
            .search_user_principals(&[email("bob")], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());
        assert!(backend
            .find_by_uri("mailto:bob@example.org", "principals/users")
            .await
            .unwrap()
            .is_none());

        let anonymous = self::backend(&backends, sharing).for_user(None);
        assert!(anonymous
            .search_user_principals(&[email("alice")], SearchTest::AllOf)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_strip_second_display_name() {
        assert_eq!(strip_second_display_name("alina (sales)"), "alina");
        assert_eq!(strip_second_display_name("alina"), "alina");
        assert_eq!(strip_second_display_name("a (b) (c)"), "a");
    }
}
