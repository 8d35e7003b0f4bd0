//! In-memory dead property store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;

use crate::traits::{PropertyStore, path_is_under};

type Key = (String, String);

/// [`PropertyStore`] keyed by `(uid, path)`.
#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    entries: RwLock<BTreeMap<Key, BTreeMap<String, String>>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for MemoryPropertyStore {
    async fn get(&self, uid: &str, path: &str) -> AppResult<BTreeMap<String, String>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(uid.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set(&self, uid: &str, path: &str, name: &str, value: &str) -> AppResult<()> {
        self.entries
            .write()
            .await
            .entry((uid.to_string(), path.to_string()))
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, uid: &str, path: &str, name: &str) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        let key = (uid.to_string(), path.to_string());
        let Some(props) = entries.get_mut(&key) else {
            return Ok(false);
        };
        let removed = props.remove(name).is_some();
        if props.is_empty() {
            entries.remove(&key);
        }
        Ok(removed)
    }

    async fn move_path(&self, uid: &str, from: &str, to: &str) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let keys: Vec<Key> = entries
            .keys()
            .filter(|(u, p)| u == uid && path_is_under(p, from))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(props) = entries.remove(key) {
                let moved = format!("{to}{}", &key.1[from.len()..]);
                entries.insert((uid.to_string(), moved), props);
            }
        }
        Ok(keys.len() as u64)
    }

    async fn delete_path(&self, uid: &str, path: &str) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(u, p), _| !(u == uid && path_is_under(p, path)));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_remove() {
        let store = MemoryPropertyStore::new();
        store.set("alice", "files/a.txt", "{urn:x}color", "red").await.unwrap();
        assert_eq!(
            store.get("alice", "files/a.txt").await.unwrap().get("{urn:x}color").map(String::as_str),
            Some("red")
        );
        assert!(store.get("bob", "files/a.txt").await.unwrap().is_empty());
        assert!(store.remove("alice", "files/a.txt", "{urn:x}color").await.unwrap());
        assert!(!store.remove("alice", "files/a.txt", "{urn:x}color").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_and_delete_cover_children() {
        let store = MemoryPropertyStore::new();
        store.set("alice", "files/docs", "{urn:x}a", "1").await.unwrap();
        store.set("alice", "files/docs/b.txt", "{urn:x}a", "2").await.unwrap();
        store.set("alice", "files/docs2", "{urn:x}a", "3").await.unwrap();

        assert_eq!(store.move_path("alice", "files/docs", "files/archive").await.unwrap(), 2);
        assert_eq!(store.get("alice", "files/archive/b.txt").await.unwrap().len(), 1);
        assert_eq!(store.get("alice", "files/docs2").await.unwrap().len(), 1);

        assert_eq!(store.delete_path("alice", "files/archive").await.unwrap(), 2);
        assert!(store.get("alice", "files/archive").await.unwrap().is_empty());
    }
}
