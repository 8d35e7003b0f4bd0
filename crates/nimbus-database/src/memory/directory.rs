//! In-memory account, group and phone-book directory.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;
use nimbus_entity::user::{Group, User};

use crate::traits::{GroupBackend, KnownUserStore, UserBackend};

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    members: BTreeMap<String, BTreeSet<String>>,
    known: BTreeSet<(String, String)>,
}

/// Implements [`UserBackend`], [`GroupBackend`] and [`KnownUserStore`] over
/// one shared state.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `known_to` has `uid` in their address book.
    pub async fn add_known_user(&self, known_to: &str, uid: &str) {
        self.state
            .write()
            .await
            .known
            .insert((known_to.to_string(), uid.to_string()));
    }
}

#[async_trait]
impl UserBackend for MemoryDirectory {
    async fn get(&self, uid: &str) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(uid).cloned())
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn search_display_name(
        &self,
        pattern: &str,
        limit: Option<usize>,
    ) -> AppResult<Vec<User>> {
        let needle = pattern.to_lowercase();
        let state = self.state.read().await;
        let matches = state.users.values().filter(|u| {
            u.uid.to_lowercase().contains(&needle)
                || u.display_name.to_lowercase().contains(&needle)
        });
        Ok(match limit {
            Some(limit) => matches.take(limit).cloned().collect(),
            None => matches.cloned().collect(),
        })
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned()
            .collect())
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        self.state
            .write()
            .await
            .users
            .insert(user.uid.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, uid: &str) -> AppResult<bool> {
        let mut state = self.state.write().await;
        for members in state.members.values_mut() {
            members.remove(uid);
        }
        Ok(state.users.remove(uid).is_some())
    }
}

#[async_trait]
impl GroupBackend for MemoryDirectory {
    async fn get(&self, gid: &str) -> AppResult<Option<Group>> {
        Ok(self.state.read().await.groups.get(gid).cloned())
    }

    async fn user_groups(&self, uid: &str) -> AppResult<Vec<Group>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .filter(|(_, members)| members.contains(uid))
            .filter_map(|(gid, _)| state.groups.get(gid).cloned())
            .collect())
    }

    async fn members(&self, gid: &str) -> AppResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .members
            .get(gid)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn save(&self, group: &Group) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.members.entry(group.gid.clone()).or_default();
        state.groups.insert(group.gid.clone(), group.clone());
        Ok(())
    }

    async fn delete(&self, gid: &str) -> AppResult<bool> {
        let mut state = self.state.write().await;
        state.members.remove(gid);
        Ok(state.groups.remove(gid).is_some())
    }

    async fn add_member(&self, gid: &str, uid: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(gid) {
            state.groups.insert(gid.to_string(), Group::new(gid));
        }
        state
            .members
            .entry(gid.to_string())
            .or_default()
            .insert(uid.to_string());
        Ok(())
    }

    async fn remove_member(&self, gid: &str, uid: &str) -> AppResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .members
            .get_mut(gid)
            .is_some_and(|m| m.remove(uid)))
    }
}

#[async_trait]
impl KnownUserStore for MemoryDirectory {
    async fn is_known_to_user(&self, known_to: &str, uid: &str) -> AppResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .known
            .contains(&(known_to.to_string(), uid.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership() {
        let dir = MemoryDirectory::new();
        UserBackend::save(&dir, &User::new("alice")).await.unwrap();
        dir.add_member("staff", "alice").await.unwrap();
        dir.add_member("admin", "alice").await.unwrap();

        assert_eq!(dir.user_group_ids("alice").await.unwrap(), vec!["admin", "staff"]);
        assert!(dir.is_in_group("alice", "staff").await.unwrap());
        assert!(dir.remove_member("staff", "alice").await.unwrap());
        assert!(!dir.is_in_group("alice", "staff").await.unwrap());
        assert!(!dir.remove_member("staff", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let dir = MemoryDirectory::new();
        UserBackend::save(&dir, &User::new("bob").with_email("Bob@Example.org"))
            .await
            .unwrap();
        assert_eq!(dir.get_by_email("bob@example.org").await.unwrap().len(), 1);
        assert!(dir.get_by_email("carol@example.org").await.unwrap().is_empty());
    }
}
