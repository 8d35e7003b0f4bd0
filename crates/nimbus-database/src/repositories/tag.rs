//! PostgreSQL personal tags and system tag assignments.

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;

use super::property::escape_like;
use crate::traits::{SystemTagMapper, TagStore};

/// [`TagStore`] backed by the `tag_object` table.
#[derive(Debug, Clone)]
pub struct PgTagStore {
    pool: PgPool,
}

impl PgTagStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagStore for PgTagStore {
    async fn tags(&self, uid: &str, path: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT tag FROM tag_object WHERE uid = $1 AND path = $2 ORDER BY tag",
        )
        .bind(uid)
        .bind(path)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load tags", e))
    }

    async fn tag(&self, uid: &str, path: &str, tag: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO tag_object (uid, path, tag) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(uid)
        .bind(path)
        .bind(tag)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to add tag", e))?;
        Ok(())
    }

    async fn untag(&self, uid: &str, path: &str, tag: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tag_object WHERE uid = $1 AND path = $2 AND tag = $3")
            .bind(uid)
            .bind(path)
            .bind(tag)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to remove tag", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn paths_with_tag(&self, uid: &str, tag: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT path FROM tag_object WHERE uid = $1 AND tag = $2 ORDER BY path",
        )
        .bind(uid)
        .bind(tag)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list tagged paths", e))
    }

    async fn move_path(&self, uid: &str, from: &str, to: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE tag_object SET path = $3 || substr(path, length($2) + 1) \
             WHERE uid = $1 AND (path = $2 OR path LIKE $4)",
        )
        .bind(uid)
        .bind(from)
        .bind(to)
        .bind(format!("{}/%", escape_like(from)))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to move tags", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_path(&self, uid: &str, path: &str) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM tag_object WHERE uid = $1 AND (path = $2 OR path LIKE $3)")
                .bind(uid)
                .bind(path)
                .bind(format!("{}/%", escape_like(path)))
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete tags", e))?;
        Ok(result.rows_affected())
    }
}

/// [`SystemTagMapper`] backed by the `systemtag_object_mapping` table.
#[derive(Debug, Clone)]
pub struct PgSystemTagMapper {
    pool: PgPool,
}

impl PgSystemTagMapper {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SystemTagMapper for PgSystemTagMapper {
    async fn object_ids(&self, tag_id: &str) -> AppResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT objectid FROM systemtag_object_mapping WHERE systemtagid = $1 ORDER BY objectid",
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list tagged objects", e))
    }

    async fn assign(&self, tag_id: &str, object_id: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO systemtag_object_mapping (systemtagid, objectid) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(tag_id)
        .bind(object_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to assign system tag", e))?;
        Ok(())
    }
}
