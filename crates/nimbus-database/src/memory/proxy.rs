//! In-memory calendar proxy delegations.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;
use nimbus_entity::proxy::Proxy;

use crate::traits::ProxyStore;

/// [`ProxyStore`] holding delegations in insertion order.
#[derive(Debug)]
pub struct MemoryProxyStore {
    proxies: RwLock<Vec<Proxy>>,
    next_id: AtomicI64,
}

impl MemoryProxyStore {
    pub fn new() -> Self {
        Self {
            proxies: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryProxyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProxyStore for MemoryProxyStore {
    async fn proxies_of(&self, owner_id: &str) -> AppResult<Vec<Proxy>> {
        Ok(self
            .proxies
            .read()
            .await
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn proxies_for(&self, proxy_id: &str) -> AppResult<Vec<Proxy>> {
        Ok(self
            .proxies
            .read()
            .await
            .iter()
            .filter(|p| p.proxy_id == proxy_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, proxy: &Proxy) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = proxy.clone();
        stored.id = id;
        self.proxies.write().await.push(stored);
        Ok(id)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut proxies = self.proxies.write().await;
        let before = proxies.len();
        proxies.retain(|p| p.id != id);
        Ok(proxies.len() != before)
    }
}
