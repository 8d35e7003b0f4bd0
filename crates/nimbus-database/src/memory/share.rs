//! In-memory share store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;
use nimbus_entity::share::{NewShareRow, ShareChanges, ShareFilter, ShareRow};

use crate::traits::ShareStore;

/// [`ShareStore`] holding rows in a `BTreeMap` keyed by id.
#[derive(Debug)]
pub struct MemoryShareStore {
    rows: RwLock<BTreeMap<i64, ShareRow>>,
    next_id: AtomicI64,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Snapshot of every row.
    pub async fn all(&self) -> Vec<ShareRow> {
        self.rows.read().await.values().cloned().collect()
    }
}

impl Default for MemoryShareStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn insert(&self, row: NewShareRow) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.write().await.insert(id, row.into_row(id));
        Ok(id)
    }

    async fn find(&self, filter: &ShareFilter) -> AppResult<Vec<ShareRow>> {
        let rows = self.rows.read().await;
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let matching = rows.values().filter(|row| filter.matches(row)).skip(offset);
        Ok(match filter.limit {
            Some(limit) => matching.take(limit.max(0) as usize).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    async fn update(&self, filter: &ShareFilter, changes: &ShareChanges) -> AppResult<u64> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut rows = self.rows.write().await;
        let mut affected = 0;
        for row in rows.values_mut().filter(|row| filter.matches(row)) {
            changes.apply(row);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, filter: &ShareFilter) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }
}
