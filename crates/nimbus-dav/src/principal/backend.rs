//! Principal lookups, group membership and calendar proxies.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use nimbus_core::config::sharing::SharingConfig;
use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::traits::{GroupBackend, KnownUserStore, ProxyStore, UserBackend};
use nimbus_entity::proxy::{PROXY_PERMISSION_READ, PROXY_PERMISSION_WRITE, Proxy};
use nimbus_entity::user::User;
use nimbus_service::{Backends, L10nFactory};

use super::circle::CircleBackend;
use super::uri::{
    self, CIRCLES_PREFIX, GROUPS_PREFIX, PROXY_READ, PROXY_WRITE, SHARES_PREFIX, SYSTEM_PREFIX,
    USERS_PREFIX,
};
use super::{
    PROP_ALTERNATE_URI_SET, PROP_CALENDAR_USER_ADDRESS_SET, PROP_CALENDAR_USER_TYPE,
    PROP_DISPLAYNAME, PROP_EMAIL_ADDRESS, PROP_EMAIL_ADDRESS_SET, PROP_LANGUAGE, Principal,
    PrincipalValue,
};

/// Maps principal URIs onto accounts, groups, circles and pseudo accounts.
///
/// Lookups that depend on who is asking (circles, group-restricted
/// searches) use the account set with [`PrincipalBackend::for_user`].
#[derive(Debug, Clone)]
pub struct PrincipalBackend {
    pub(super) users: Arc<dyn UserBackend>,
    pub(super) groups: Arc<dyn GroupBackend>,
    pub(super) known_users: Arc<dyn KnownUserStore>,
    proxies: Arc<dyn ProxyStore>,
    circles: Arc<dyn CircleBackend>,
    pub(super) sharing: SharingConfig,
    circles_enabled: bool,
    l10n: L10nFactory,
    pub(super) principal_prefix: String,
    has_groups: bool,
    pub(super) current_user: Option<String>,
}

impl PrincipalBackend {
    /// Backend for `principals/users`.
    pub fn new(
        backends: &Backends,
        proxies: Arc<dyn ProxyStore>,
        circles: Arc<dyn CircleBackend>,
        sharing: SharingConfig,
        circles_enabled: bool,
        l10n: L10nFactory,
    ) -> Self {
        Self {
            users: backends.users.clone(),
            groups: backends.groups.clone(),
            known_users: backends.known_users.clone(),
            proxies,
            circles,
            sharing,
            circles_enabled,
            l10n,
            principal_prefix: USERS_PREFIX.to_string(),
            has_groups: true,
            current_user: None,
        }
    }

    /// Same backend serving account principals under another prefix.
    ///
    /// Group and circle memberships are only reported for
    /// `principals/users`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.principal_prefix = prefix.trim_matches('/').to_string();
        self.has_groups = self.principal_prefix == USERS_PREFIX;
        self
    }

    /// Same backend acting on behalf of `uid`.
    pub fn for_user(mut self, uid: Option<&str>) -> Self {
        self.current_user = uid.map(str::to_string);
        self
    }

    pub fn principal_prefix(&self) -> &str {
        &self.principal_prefix
    }

    /// Every account principal when `prefix` is this backend's prefix.
    pub async fn get_principals_by_prefix(&self, prefix: &str) -> AppResult<Vec<Principal>> {
        if prefix.trim_matches('/') != self.principal_prefix {
            return Ok(Vec::new());
        }
        Ok(self
            .users
            .list()
            .await?
            .iter()
            .map(|user| self.user_to_principal(user))
            .collect())
    }

    /// Principal behind a path, `None` when nothing matches.
    pub async fn get_principal_by_path(&self, path: &str) -> AppResult<Option<Principal>> {
        let (prefix, name) = uri::split(path);
        let decoded = uri::decode(name);

        if name == PROXY_READ || name == PROXY_WRITE {
            let (owner_prefix, owner) = uri::split(prefix);
            if owner_prefix == self.principal_prefix {
                return Ok(self
                    .users
                    .get(owner)
                    .await?
                    .map(|user| Principal::new(format!("{USERS_PREFIX}/{}/{name}", user.uid))));
            }
        }

        if prefix == self.principal_prefix {
            return Ok(self
                .users
                .get(&decoded)
                .await?
                .map(|user| self.user_to_principal(&user)));
        }

        match prefix {
            CIRCLES_PREFIX => {
                if self.current_user.is_none() {
                    return Ok(None);
                }
                if let Some(principal) = self.circle_to_principal(&decoded).await? {
                    return Ok(Some(principal));
                }
                self.circle_to_principal(name).await
            }
            GROUPS_PREFIX => {
                let group = match self.groups.get(&decoded).await? {
                    Some(group) => Some(group),
                    None => self.groups.get(name).await?,
                };
                Ok(group.map(|group| {
                    Principal::new(format!("{GROUPS_PREFIX}/{name}"))
                        .with_text(PROP_DISPLAYNAME, group.display_name)
                }))
            }
            SYSTEM_PREFIX => {
                let language = self.current_language().await?;
                Ok(Some(
                    Principal::new(format!("{SYSTEM_PREFIX}/{name}")).with_text(
                        PROP_DISPLAYNAME,
                        self.l10n.get("dav", &language).t("Accounts", &[]),
                    ),
                ))
            }
            SHARES_PREFIX => Ok(Some(
                Principal::new(format!("{SHARES_PREFIX}/{name}")).with_text(PROP_DISPLAYNAME, name),
            )),
            _ => Ok(None),
        }
    }

    /// One property of the principal behind a path.
    pub async fn get_principal_property_by_path(
        &self,
        path: &str,
        property: &str,
    ) -> AppResult<Option<PrincipalValue>> {
        Ok(self
            .get_principal_by_path(path)
            .await?
            .and_then(|principal| principal.properties.get(property).cloned()))
    }

    /// Members of a calendar proxy sub-principal.
    ///
    /// Any other principal has no member set.
    pub async fn get_group_member_set(&self, principal: &str) -> AppResult<Vec<String>> {
        let (owner, target) = uri::split(principal);
        let wanted = match target {
            PROXY_READ => PROXY_PERMISSION_READ,
            PROXY_WRITE => PROXY_PERMISSION_WRITE,
            _ => return Ok(Vec::new()),
        };
        if self.get_principal_by_path(owner).await?.is_none() {
            return Err(AppError::not_found("Principal not found"));
        }
        Ok(self
            .proxies
            .proxies_of(owner)
            .await?
            .into_iter()
            .filter(|proxy| proxy.permissions == wanted)
            .map(|proxy| proxy.proxy_id)
            .collect())
    }

    /// Groups and proxy sub-principals an account principal belongs to.
    ///
    /// Groups hidden from collaboration are left out. Principals outside
    /// this backend's prefix belong to nothing.
    pub async fn get_group_membership(
        &self,
        principal: &str,
        need_groups: bool,
    ) -> AppResult<Vec<String>> {
        let (prefix, name) = uri::split(principal);
        if prefix != self.principal_prefix {
            return Ok(Vec::new());
        }
        if self.users.get(name).await?.is_none() {
            return Err(AppError::not_found("Principal not found"));
        }

        let mut memberships = Vec::new();
        if self.has_groups || need_groups {
            for group in self.groups.user_groups(name).await? {
                if group.hide_from_collaboration {
                    continue;
                }
                memberships.push(format!("{GROUPS_PREFIX}/{}", uri::encode(&group.gid)));
            }
        }

        for proxy in self.proxies.proxies_for(principal.trim_end_matches('/')).await? {
            let membership = if proxy.is_read() {
                format!("{}/{PROXY_READ}", proxy.owner_id)
            } else if proxy.is_write() {
                format!("{}/{PROXY_WRITE}", proxy.owner_id)
            } else {
                continue;
            };
            if !memberships.contains(&membership) {
                memberships.push(membership);
            }
        }

        Ok(memberships)
    }

    /// Replace the delegates of a calendar proxy sub-principal.
    ///
    /// Membership of any other principal cannot be changed.
    pub async fn set_group_member_set(&self, principal: &str, members: &[String]) -> AppResult<()> {
        let (owner, target) = uri::split(principal);
        let permissions = match target {
            PROXY_READ => PROXY_PERMISSION_READ,
            PROXY_WRITE => PROXY_PERMISSION_WRITE,
            _ => {
                return Err(AppError::not_implemented(
                    "Setting members of the group is not supported yet",
                ));
            }
        };
        if self.get_principal_by_path(owner).await?.is_none() {
            return Err(AppError::not_found("Principal not found"));
        }

        for member in members {
            let (prefix, _) = uri::split(member);
            if prefix != self.principal_prefix {
                return Err(AppError::validation(format!(
                    "Invalid member group prefix: {prefix}"
                )));
            }
            if self.get_principal_by_path(member).await?.is_none() {
                return Err(AppError::validation("Invalid member group principal"));
            }
        }

        for proxy in self.proxies.proxies_of(owner).await? {
            if proxy.permissions == permissions {
                self.proxies.delete(proxy.id).await?;
            }
        }
        for member in members {
            self.proxies
                .insert(&Proxy::new(owner, member.trim_end_matches('/'), permissions))
                .await?;
        }

        debug!(principal = %principal, members = members.len(), "Proxy members replaced");
        Ok(())
    }

    /// Principal properties are not writable here; always reports `0`.
    pub fn update_principal(&self, _path: &str, _changes: &BTreeMap<String, Option<String>>) -> i32 {
        0
    }

    /// Resolve a `mailto:` or `principal:` URI to an account principal URI.
    ///
    /// Returns `None` when sharing is disabled, when the address is not
    /// unique, or when group-restricted sharing hides the account.
    pub async fn find_by_uri(&self, target: &str, principal_prefix: &str) -> AppResult<Option<String>> {
        if !self.sharing.api_enabled {
            return Ok(None);
        }

        let restrict_groups = match self.restricting_groups().await? {
            Restriction::Denied => return Ok(None),
            Restriction::Groups(groups) => Some(groups),
            Restriction::None => None,
        };

        if let Some(email) = target.strip_prefix("mailto:") {
            if principal_prefix.trim_matches('/') == USERS_PREFIX {
                let mut users = self.users.get_by_email(email).await?;
                if users.len() != 1 {
                    return Ok(None);
                }
                let user = users.remove(0);
                if let Some(restrict) = &restrict_groups {
                    if !self.shares_group(&user.uid, restrict).await? {
                        return Ok(None);
                    }
                }
                return Ok(Some(format!("{}/{}", self.principal_prefix, user.uid)));
            }
        }

        if let Some(path) = target.strip_prefix("principal:") {
            return Ok(self.get_principal_by_path(path).await?.map(|p| p.uri));
        }

        Ok(None)
    }

    /// Circles an account principal has joined, as circle principal URIs.
    pub async fn get_circle_membership(&self, principal: &str) -> AppResult<Vec<String>> {
        if !self.circles_enabled {
            return Ok(Vec::new());
        }
        let (prefix, name) = uri::split(principal);
        if !self.has_groups || prefix != self.principal_prefix {
            return Ok(Vec::new());
        }
        if self.users.get(name).await?.is_none() {
            return Err(AppError::not_found("Principal not found"));
        }
        Ok(self
            .circles
            .joined_circles(name)
            .await?
            .into_iter()
            .map(|circle| format!("{CIRCLES_PREFIX}/{}", uri::encode(&circle.single_id)))
            .collect())
    }

    /// Every email address of a principal, without `mailto:` and deduplicated.
    pub fn get_email_addresses_of_principal(&self, principal: &Principal) -> Vec<String> {
        let mut addresses: Vec<String> = Vec::new();
        let mut push = |address: &str| {
            if !addresses.iter().any(|a| a == address) {
                addresses.push(address.to_string());
            }
        };

        if let Some(email) = principal.email() {
            push(email);
        }
        for name in [
            PROP_ALTERNATE_URI_SET,
            PROP_CALENDAR_USER_ADDRESS_SET,
            PROP_EMAIL_ADDRESS_SET,
        ] {
            if let Some(value) = principal.property(name) {
                for uri in value.as_uris() {
                    if let Some(address) = uri.strip_prefix("mailto:") {
                        push(address);
                    }
                }
            }
        }
        addresses
    }

    pub(super) fn user_to_principal(&self, user: &User) -> Principal {
        let mut principal = Principal::new(format!("{}/{}", self.principal_prefix, user.uid))
            .with_text(PROP_DISPLAYNAME, user.display_name_or_uid())
            .with_text(PROP_CALENDAR_USER_TYPE, "INDIVIDUAL")
            .with_text(PROP_LANGUAGE, self.l10n.user_language(user));

        if let Some(email) = user.email_address() {
            principal = principal.with_text(PROP_EMAIL_ADDRESS, email);
        }
        if !user.additional_emails.is_empty() {
            principal = principal.with_uris(
                PROP_ALTERNATE_URI_SET,
                user.additional_emails
                    .iter()
                    .map(|email| format!("mailto:{email}"))
                    .collect(),
            );
        }
        principal
    }

    async fn circle_to_principal(&self, circle_id: &str) -> AppResult<Option<Principal>> {
        if !self.circles_enabled {
            return Ok(None);
        }
        Ok(self.circles.details(circle_id).await?.map(|circle| {
            Principal::new(format!("{CIRCLES_PREFIX}/{circle_id}"))
                .with_text(PROP_DISPLAYNAME, circle.display_name)
        }))
    }

    async fn current_language(&self) -> AppResult<String> {
        if let Some(uid) = &self.current_user {
            if let Some(user) = self.users.get(uid).await? {
                return Ok(self.l10n.user_language(&user));
            }
        }
        Ok(nimbus_service::l10n::DEFAULT_LANGUAGE.to_string())
    }

    /// Groups the acting account must share with a result when sharing is
    /// restricted to group members.
    pub(super) async fn restricting_groups(&self) -> AppResult<Restriction> {
        if !self.sharing.only_share_with_group_members {
            return Ok(Restriction::None);
        }
        match &self.current_user {
            Some(uid) => Ok(Restriction::Groups(self.groups.user_group_ids(uid).await?)),
            None => Ok(Restriction::Denied),
        }
    }

    pub(super) async fn shares_group(&self, uid: &str, groups: &[String]) -> AppResult<bool> {
        Ok(self
            .groups
            .user_group_ids(uid)
            .await?
            .iter()
            .any(|gid| groups.contains(gid)))
    }
}

/// Effect of group-restricted sharing on a lookup.
#[derive(Debug)]
pub(super) enum Restriction {
    /// Sharing is not restricted.
    None,
    /// Restricted and nobody is acting, so nothing may be found.
    Denied,
    /// Results must share one of these groups.
    Groups(Vec<String>),
}

#[cfg(test)]
mod tests {
    use nimbus_core::error::ErrorKind;
    use nimbus_database::memory::MemoryProxyStore;
    use nimbus_entity::user::Group;

    use super::*;
    use crate::principal::circle::{Circle, MemoryCircles};

    async fn backend() -> PrincipalBackend {
        let (backends, directory, _) = Backends::memory();
        let alice = User::new("alice")
            .with_display_name("Alice Liddell")
            .with_email("alice@example.org");
        let mut bob = User::new("bob").with_email("bob@example.org");
        bob.additional_emails = vec!["robert@example.org".into()];
        UserBackend::save(directory.as_ref(), &alice).await.unwrap();
        UserBackend::save(directory.as_ref(), &bob).await.unwrap();

        let mut hidden = Group::new("hidden");
        hidden.hide_from_collaboration = true;
        GroupBackend::save(directory.as_ref(), &Group::new("Sales & Marketing"))
            .await
            .unwrap();
        GroupBackend::save(directory.as_ref(), &hidden).await.unwrap();
        directory.add_member("Sales & Marketing", "alice").await.unwrap();
        directory.add_member("hidden", "alice").await.unwrap();

        let circles = Arc::new(MemoryCircles::new());
        circles
            .insert(
                Circle {
                    single_id: "c1".into(),
                    display_name: "Book club".into(),
                },
                &["alice"],
            )
            .await;

        PrincipalBackend::new(
            &backends,
            Arc::new(MemoryProxyStore::new()),
            circles,
            SharingConfig::default(),
            true,
            L10nFactory::new(),
        )
    }

    #[tokio::test]
    async fn test_user_principal() {
        let backend = backend().await;
        let alice = backend
            .get_principal_by_path("principals/users/alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.uri, "principals/users/alice");
        assert_eq!(alice.display_name(), Some("Alice Liddell"));
        assert_eq!(alice.email(), Some("alice@example.org"));

        let bob = backend
            .get_principal_by_path("principals/users/bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bob.display_name(), Some("bob"));
        assert_eq!(
            backend.get_email_addresses_of_principal(&bob),
            vec!["bob@example.org", "robert@example.org"]
        );

        assert!(backend
            .get_principal_by_path("principals/users/nobody")
            .await
            .unwrap()
            .is_none());
        assert_eq!(backend.get_principals_by_prefix("principals/users").await.unwrap().len(), 2);
        assert!(backend.get_principals_by_prefix("principals/groups").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pseudo_principals() {
        let backend = backend().await;
        let group = backend
            .get_principal_by_path("principals/groups/Sales+%26+Marketing")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.uri, "principals/groups/Sales+%26+Marketing");

        let system = backend
            .get_principal_by_path("principals/system/system")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(system.display_name(), Some("Accounts"));

        let share = backend
            .get_principal_by_path("principals/shares/abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(share.display_name(), Some("abc123"));

        let proxy = backend
            .get_principal_by_path("principals/users/alice/calendar-proxy-read")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(proxy.uri, "principals/users/alice/calendar-proxy-read");
    }

    #[tokio::test]
    async fn test_circles_require_a_session() {
        let backend = backend().await;
        assert!(backend
            .get_principal_by_path("principals/circles/c1")
            .await
            .unwrap()
            .is_none());

        let backend = backend.for_user(Some("alice"));
        let circle = backend
            .get_principal_by_path("principals/circles/c1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(circle.display_name(), Some("Book club"));
        assert_eq!(
            backend.get_circle_membership("principals/users/alice").await.unwrap(),
            vec!["principals/circles/c1"]
        );
    }

    #[tokio::test]
    async fn test_group_membership_skips_hidden_groups() {
        let backend = backend().await;
        assert_eq!(
            backend
                .get_group_membership("principals/users/alice", false)
                .await
                .unwrap(),
            vec!["principals/groups/Sales+%26+Marketing"]
        );
        assert!(backend
            .get_group_membership("principals/groups/x", false)
            .await
            .unwrap()
            .is_empty());
        let err = backend
            .get_group_membership("principals/users/nobody", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_proxy_member_set() {
        let backend = backend().await;
        backend
            .set_group_member_set(
                "principals/users/alice/calendar-proxy-write",
                &["principals/users/bob".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(
            backend
                .get_group_member_set("principals/users/alice/calendar-proxy-write")
                .await
                .unwrap(),
            vec!["principals/users/bob"]
        );
        assert!(backend
            .get_group_member_set("principals/users/alice/calendar-proxy-read")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            backend
                .get_group_membership("principals/users/bob", false)
                .await
                .unwrap(),
            vec!["principals/users/alice/calendar-proxy-write"]
        );

        let err = backend
            .set_group_member_set("principals/groups/x", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);
        let err = backend
            .set_group_member_set(
                "principals/users/alice/calendar-proxy-read",
                &["principals/groups/Sales".to_string()],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_find_by_uri() {
        let backend = backend().await;
        assert_eq!(
            backend
                .find_by_uri("mailto:alice@example.org", "principals/users")
                .await
                .unwrap()
                .as_deref(),
            Some("principals/users/alice")
        );
        assert!(backend
            .find_by_uri("mailto:nobody@example.org", "principals/users")
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            backend
                .find_by_uri("principal:principals/users/bob", "principals/users")
                .await
                .unwrap()
                .as_deref(),
            Some("principals/users/bob")
        );
        assert_eq!(backend.update_principal("principals/users/bob", &BTreeMap::new()), 0);
    }
}
