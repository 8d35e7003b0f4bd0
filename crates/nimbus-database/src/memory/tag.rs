//! In-memory personal tags and system tag assignments.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;

use crate::traits::{SystemTagMapper, TagStore, path_is_under};

type Key = (String, String);

/// [`TagStore`] keyed by `(uid, path)`.
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    tags: RwLock<BTreeMap<Key, BTreeSet<String>>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn tags(&self, uid: &str, path: &str) -> AppResult<Vec<String>> {
        Ok(self
            .tags
            .read()
            .await
            .get(&(uid.to_string(), path.to_string()))
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn tag(&self, uid: &str, path: &str, tag: &str) -> AppResult<()> {
        self.tags
            .write()
            .await
            .entry((uid.to_string(), path.to_string()))
            .or_default()
            .insert(tag.to_string());
        Ok(())
    }

    async fn untag(&self, uid: &str, path: &str, tag: &str) -> AppResult<bool> {
        Ok(self
            .tags
            .write()
            .await
            .get_mut(&(uid.to_string(), path.to_string()))
            .is_some_and(|t| t.remove(tag)))
    }

    async fn paths_with_tag(&self, uid: &str, tag: &str) -> AppResult<Vec<String>> {
        Ok(self
            .tags
            .read()
            .await
            .iter()
            .filter(|((u, _), tags)| u == uid && tags.contains(tag))
            .map(|((_, path), _)| path.clone())
            .collect())
    }

    async fn move_path(&self, uid: &str, from: &str, to: &str) -> AppResult<u64> {
        let mut tags = self.tags.write().await;
        let keys: Vec<Key> = tags
            .keys()
            .filter(|(u, p)| u == uid && path_is_under(p, from))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(set) = tags.remove(key) {
                let moved = format!("{to}{}", &key.1[from.len()..]);
                tags.insert((uid.to_string(), moved), set);
            }
        }
        Ok(keys.len() as u64)
    }

    async fn delete_path(&self, uid: &str, path: &str) -> AppResult<u64> {
        let mut tags = self.tags.write().await;
        let before = tags.len();
        tags.retain(|(u, p), _| !(u == uid && path_is_under(p, path)));
        Ok((before - tags.len()) as u64)
    }
}

/// [`SystemTagMapper`] over a map of tag id to file ids.
#[derive(Debug, Default)]
pub struct MemorySystemTags {
    objects: RwLock<BTreeMap<String, BTreeSet<i64>>>,
}

impl MemorySystemTags {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SystemTagMapper for MemorySystemTags {
    async fn object_ids(&self, tag_id: &str) -> AppResult<Vec<i64>> {
        Ok(self
            .objects
            .read()
            .await
            .get(tag_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn assign(&self, tag_id: &str, object_id: i64) -> AppResult<()> {
        self.objects
            .write()
            .await
            .entry(tag_id.to_string())
            .or_default()
            .insert(object_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FAVORITE_TAG;

    #[tokio::test]
    async fn test_favorites_per_user() {
        let store = MemoryTagStore::new();
        store.tag("alice", "files/a.txt", FAVORITE_TAG).await.unwrap();
        store.tag("alice", "files/a.txt", "work").await.unwrap();
        store.tag("bob", "files/b.txt", FAVORITE_TAG).await.unwrap();

        assert_eq!(
            store.paths_with_tag("alice", FAVORITE_TAG).await.unwrap(),
            vec!["files/a.txt"]
        );
        assert_eq!(store.tags("alice", "files/a.txt").await.unwrap().len(), 2);
        assert!(store.untag("alice", "files/a.txt", FAVORITE_TAG).await.unwrap());
        assert!(store.paths_with_tag("alice", FAVORITE_TAG).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_tag_assignment() {
        let tags = MemorySystemTags::new();
        tags.assign("1", 20).await.unwrap();
        tags.assign("1", 10).await.unwrap();
        assert_eq!(tags.object_ids("1").await.unwrap(), vec![10, 20]);
        assert!(tags.object_ids("2").await.unwrap().is_empty());
    }
}
