//! In-memory file cache.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;
use nimbus_entity::node::Node;

use crate::traits::NodeLookup;

/// [`NodeLookup`] over a map of nodes.
#[derive(Debug, Default)]
pub struct MemoryNodeLookup {
    nodes: RwLock<BTreeMap<i64, Node>>,
}

impl MemoryNodeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub async fn insert(&self, node: Node) {
        self.nodes.write().await.insert(node.id, node);
    }

    /// Remove a node, simulating a deleted file.
    pub async fn remove(&self, id: i64) {
        self.nodes.write().await.remove(&id);
    }
}

#[async_trait]
impl NodeLookup for MemoryNodeLookup {
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Node>> {
        Ok(self.nodes.read().await.get(&id).cloned())
    }

    async fn get_children(&self, folder_id: i64) -> AppResult<Vec<Node>> {
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .filter(|n| n.parent_id == Some(folder_id))
            .cloned()
            .collect())
    }

    async fn get_by_path(&self, storage_id: &str, path: &str) -> AppResult<Option<Node>> {
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .find(|n| n.storage_id == storage_id && n.path == path)
            .cloned())
    }
}
