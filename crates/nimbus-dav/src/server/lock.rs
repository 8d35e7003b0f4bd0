//! In-process path locks held for the duration of a write request.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use nimbus_database::traits::path_is_under;

/// Exclusive locks on `(storage id, storage path)` pairs.
///
/// Locking a path conflicts with any held lock on an ancestor or a
/// descendant of it.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    held: Arc<Mutex<HashSet<(String, String)>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, `None` when a conflicting lock is held.
    pub fn try_lock(&self, storage_id: &str, path: &str) -> Option<PathLock> {
        let mut held = self.guard();
        let conflict = held.iter().any(|(storage, locked)| {
            storage == storage_id && (path_is_under(path, locked) || path_is_under(locked, path))
        });
        if conflict {
            return None;
        }
        let key = (storage_id.to_string(), path.to_string());
        held.insert(key.clone());
        Some(PathLock {
            manager: self.clone(),
            key,
        })
    }

    pub fn is_locked(&self, storage_id: &str, path: &str) -> bool {
        self.guard()
            .iter()
            .any(|(storage, locked)| storage == storage_id && path_is_under(path, locked))
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<(String, String)>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A held lock, released on drop.
#[derive(Debug)]
pub struct PathLock {
    manager: LockManager,
    key: (String, String),
}

impl PathLock {
    pub fn path(&self) -> &str {
        &self.key.1
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        self.manager.guard().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_with_ancestors_and_descendants() {
        let locks = LockManager::new();
        let held = locks.try_lock("home::alice", "files/docs").unwrap();
        assert!(locks.try_lock("home::alice", "files/docs/a.txt").is_none());
        assert!(locks.try_lock("home::alice", "files").is_none());
        assert!(locks.try_lock("home::alice", "files/docs2").is_some());
        assert!(locks.try_lock("home::bob", "files/docs").is_some());
        assert!(locks.is_locked("home::alice", "files/docs/a.txt"));

        drop(held);
        assert!(!locks.is_locked("home::alice", "files/docs"));
        assert!(locks.try_lock("home::alice", "files/docs/a.txt").is_some());
    }
}
