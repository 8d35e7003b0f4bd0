//! PostgreSQL file cache lookups.

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::node::{Node, NodeRow};

use crate::traits::NodeLookup;

/// [`NodeLookup`] backed by the `filecache` table.
#[derive(Debug, Clone)]
pub struct PgNodeLookup {
    pool: PgPool,
}

impl PgNodeLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeLookup for PgNodeLookup {
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, NodeRow>("SELECT * FROM filecache WHERE fileid = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Node::from))
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find node", e))
    }

    async fn get_children(&self, folder_id: i64) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, NodeRow>("SELECT * FROM filecache WHERE parent = $1 ORDER BY fileid")
            .bind(folder_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Node::from).collect())
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list folder children", e)
            })
    }

    async fn get_by_path(&self, storage_id: &str, path: &str) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, NodeRow>("SELECT * FROM filecache WHERE storage_id = $1 AND path = $2")
            .bind(storage_id)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Node::from))
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find node by path", e))
    }
}
