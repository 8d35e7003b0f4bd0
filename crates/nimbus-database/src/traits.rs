//! Backend traits consumed by the share provider, the principal backend and
//! the DAV server plugins.
//!
//! Each trait has a PostgreSQL implementation in [`crate::repositories`] and
//! an in-memory implementation in [`crate::memory`].

use std::collections::BTreeMap;

use async_trait::async_trait;

use nimbus_core::result::AppResult;
use nimbus_entity::node::Node;
use nimbus_entity::proxy::Proxy;
use nimbus_entity::share::{NewShareRow, ShareChanges, ShareFilter, ShareRow};
use nimbus_entity::user::{Group, User};

/// Statement-level access to the `share` relation.
#[async_trait]
pub trait ShareStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a row and return its id.
    async fn insert(&self, row: NewShareRow) -> AppResult<i64>;

    /// Rows matching the filter, ordered by id.
    async fn find(&self, filter: &ShareFilter) -> AppResult<Vec<ShareRow>>;

    /// Apply changes to every matching row. Returns the affected row count.
    async fn update(&self, filter: &ShareFilter, changes: &ShareChanges) -> AppResult<u64>;

    /// Delete every matching row. Returns the affected row count.
    async fn delete(&self, filter: &ShareFilter) -> AppResult<u64>;

    /// First matching row.
    async fn find_one(&self, filter: &ShareFilter) -> AppResult<Option<ShareRow>> {
        let mut filter = filter.clone();
        filter.limit = Some(1);
        Ok(self.find(&filter).await?.into_iter().next())
    }
}

/// Account directory.
#[async_trait]
pub trait UserBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Look up an account.
    async fn get(&self, uid: &str) -> AppResult<Option<User>>;

    /// Whether an account exists.
    async fn exists(&self, uid: &str) -> AppResult<bool> {
        Ok(self.get(uid).await?.is_some())
    }

    /// Every account, ordered by uid.
    async fn list(&self) -> AppResult<Vec<User>>;

    /// Accounts whose uid or display name contains `pattern`, case-insensitively.
    async fn search_display_name(&self, pattern: &str, limit: Option<usize>)
    -> AppResult<Vec<User>>;

    /// Accounts whose primary email equals `email`, case-insensitively.
    async fn get_by_email(&self, email: &str) -> AppResult<Vec<User>>;

    /// Create or replace an account.
    async fn save(&self, user: &User) -> AppResult<()>;

    /// Remove an account. Returns whether it existed.
    async fn delete(&self, uid: &str) -> AppResult<bool>;
}

/// Group directory and membership.
#[async_trait]
pub trait GroupBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Look up a group.
    async fn get(&self, gid: &str) -> AppResult<Option<Group>>;

    /// Groups an account belongs to, ordered by gid.
    async fn user_groups(&self, uid: &str) -> AppResult<Vec<Group>>;

    /// Ids of the groups an account belongs to.
    async fn user_group_ids(&self, uid: &str) -> AppResult<Vec<String>> {
        Ok(self
            .user_groups(uid)
            .await?
            .into_iter()
            .map(|g| g.gid)
            .collect())
    }

    /// Uids of the members of a group, ordered.
    async fn members(&self, gid: &str) -> AppResult<Vec<String>>;

    /// Whether `uid` is a member of `gid`.
    async fn is_in_group(&self, uid: &str, gid: &str) -> AppResult<bool> {
        Ok(self.user_group_ids(uid).await?.iter().any(|g| g == gid))
    }

    /// Create or replace a group.
    async fn save(&self, group: &Group) -> AppResult<()>;

    /// Remove a group and its memberships. Returns whether it existed.
    async fn delete(&self, gid: &str) -> AppResult<bool>;

    /// Add a member.
    async fn add_member(&self, gid: &str, uid: &str) -> AppResult<()>;

    /// Remove a member. Returns whether the membership existed.
    async fn remove_member(&self, gid: &str, uid: &str) -> AppResult<bool>;
}

/// Phone-book matches between accounts.
#[async_trait]
pub trait KnownUserStore: Send + Sync + std::fmt::Debug + 'static {
    /// Whether `uid` is in the address book of `known_to`.
    async fn is_known_to_user(&self, known_to: &str, uid: &str) -> AppResult<bool>;
}

/// File cache lookups.
#[async_trait]
pub trait NodeLookup: Send + Sync + std::fmt::Debug + 'static {
    /// Node by file id. Deleted entries are absent.
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Node>>;

    /// Direct children of a folder.
    async fn get_children(&self, folder_id: i64) -> AppResult<Vec<Node>>;

    /// Node by storage-relative path, e.g. `files/report.pdf` on `home::alice`.
    async fn get_by_path(&self, storage_id: &str, path: &str) -> AppResult<Option<Node>>;
}

/// Dead properties stored through PROPPATCH, keyed by account and path.
///
/// Names are in Clark notation (`{namespace}name`).
#[async_trait]
pub trait PropertyStore: Send + Sync + std::fmt::Debug + 'static {
    /// Every stored property of one path.
    async fn get(&self, uid: &str, path: &str) -> AppResult<BTreeMap<String, String>>;

    /// Create or replace a property.
    async fn set(&self, uid: &str, path: &str, name: &str, value: &str) -> AppResult<()>;

    /// Remove a property. Returns whether it existed.
    async fn remove(&self, uid: &str, path: &str, name: &str) -> AppResult<bool>;

    /// Re-key the properties of a path and everything below it.
    async fn move_path(&self, uid: &str, from: &str, to: &str) -> AppResult<u64>;

    /// Drop the properties of a path and everything below it.
    async fn delete_path(&self, uid: &str, path: &str) -> AppResult<u64>;
}

/// Tag marking a favorite.
pub const FAVORITE_TAG: &str = "_$!<Favorite>!$_";

/// Personal tags and favorites, keyed by account and path.
#[async_trait]
pub trait TagStore: Send + Sync + std::fmt::Debug + 'static {
    /// Tags on one path, ordered.
    async fn tags(&self, uid: &str, path: &str) -> AppResult<Vec<String>>;

    /// Add a tag. Adding an existing tag is a no-op.
    async fn tag(&self, uid: &str, path: &str, tag: &str) -> AppResult<()>;

    /// Remove a tag. Returns whether it was set.
    async fn untag(&self, uid: &str, path: &str, tag: &str) -> AppResult<bool>;

    /// Paths carrying a tag, ordered.
    async fn paths_with_tag(&self, uid: &str, tag: &str) -> AppResult<Vec<String>>;

    /// Re-key the tags of a path and everything below it.
    async fn move_path(&self, uid: &str, from: &str, to: &str) -> AppResult<u64>;

    /// Drop the tags of a path and everything below it.
    async fn delete_path(&self, uid: &str, path: &str) -> AppResult<u64>;
}

/// Administrator-managed tags assigned to file ids.
#[async_trait]
pub trait SystemTagMapper: Send + Sync + std::fmt::Debug + 'static {
    /// File ids carrying a system tag.
    async fn object_ids(&self, tag_id: &str) -> AppResult<Vec<i64>>;

    /// Assign a system tag to a file id.
    async fn assign(&self, tag_id: &str, object_id: i64) -> AppResult<()>;
}

/// Calendar proxy delegations.
#[async_trait]
pub trait ProxyStore: Send + Sync + std::fmt::Debug + 'static {
    /// Delegations granted by `owner_id`.
    async fn proxies_of(&self, owner_id: &str) -> AppResult<Vec<Proxy>>;

    /// Delegations granted to `proxy_id`.
    async fn proxies_for(&self, proxy_id: &str) -> AppResult<Vec<Proxy>>;

    /// Store a delegation and return its id.
    async fn insert(&self, proxy: &Proxy) -> AppResult<i64>;

    /// Remove a delegation by id.
    async fn delete(&self, id: i64) -> AppResult<bool>;
}

/// Whether `path` equals `prefix` or lies below it.
pub fn path_is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
