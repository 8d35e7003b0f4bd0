//! PostgreSQL group directory.

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::user::Group;

use crate::traits::GroupBackend;

/// [`GroupBackend`] backed by the `groups` and `group_user` tables.
#[derive(Debug, Clone)]
pub struct PgGroupBackend {
    pool: PgPool,
}

impl PgGroupBackend {
    /// Create a new group directory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupBackend for PgGroupBackend {
    async fn get(&self, gid: &str) -> AppResult<Option<Group>> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE gid = $1")
            .bind(gid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find group", e))
    }

    async fn user_groups(&self, uid: &str) -> AppResult<Vec<Group>> {
        sqlx::query_as::<_, Group>(
            "SELECT g.* FROM groups g JOIN group_user gu ON gu.gid = g.gid \
             WHERE gu.uid = $1 ORDER BY g.gid",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list user groups", e))
    }

    async fn members(&self, gid: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT uid FROM group_user WHERE gid = $1 ORDER BY uid")
            .bind(gid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list group members", e)
            })
    }

    async fn is_in_group(&self, uid: &str, gid: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_user WHERE gid = $1 AND uid = $2)",
        )
        .bind(gid)
        .bind(uid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check membership", e))
    }

    async fn save(&self, group: &Group) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO groups (gid, display_name, hide_from_collaboration) VALUES ($1, $2, $3) \
             ON CONFLICT (gid) DO UPDATE SET display_name = EXCLUDED.display_name, \
             hide_from_collaboration = EXCLUDED.hide_from_collaboration",
        )
        .bind(&group.gid)
        .bind(&group.display_name)
        .bind(group.hide_from_collaboration)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save group", e))?;
        Ok(())
    }

    async fn delete(&self, gid: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE gid = $1")
            .bind(gid)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete group", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_member(&self, gid: &str, uid: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO group_user (gid, uid) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(gid)
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to add member", e))?;
        Ok(())
    }

    async fn remove_member(&self, gid: &str, uid: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM group_user WHERE gid = $1 AND uid = $2")
            .bind(gid)
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to remove member", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}
