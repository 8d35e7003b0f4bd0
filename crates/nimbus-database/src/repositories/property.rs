//! PostgreSQL dead property store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;

use crate::traits::PropertyStore;

/// [`PropertyStore`] backed by the `properties` table.
#[derive(Debug, Clone)]
pub struct PgPropertyStore {
    pool: PgPool,
}

impl PgPropertyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, message, e)
}

#[async_trait]
impl PropertyStore for PgPropertyStore {
    async fn get(&self, uid: &str, path: &str) -> AppResult<BTreeMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT propertyname, propertyvalue FROM properties \
             WHERE userid = $1 AND propertypath = $2",
        )
        .bind(uid)
        .bind(path)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load properties"))?;
        Ok(rows.into_iter().collect())
    }

    async fn set(&self, uid: &str, path: &str, name: &str, value: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO properties (userid, propertypath, propertyname, propertyvalue) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (userid, propertypath, propertyname) \
             DO UPDATE SET propertyvalue = EXCLUDED.propertyvalue",
        )
        .bind(uid)
        .bind(path)
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to store property"))?;
        Ok(())
    }

    async fn remove(&self, uid: &str, path: &str, name: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM properties WHERE userid = $1 AND propertypath = $2 AND propertyname = $3",
        )
        .bind(uid)
        .bind(path)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to remove property"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn move_path(&self, uid: &str, from: &str, to: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE properties SET propertypath = $3 || substr(propertypath, length($2) + 1) \
             WHERE userid = $1 AND (propertypath = $2 OR propertypath LIKE $4)",
        )
        .bind(uid)
        .bind(from)
        .bind(to)
        .bind(format!("{}/%", escape_like(from)))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to move properties"))?;
        Ok(result.rows_affected())
    }

    async fn delete_path(&self, uid: &str, path: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM properties WHERE userid = $1 AND (propertypath = $2 OR propertypath LIKE $3)",
        )
        .bind(uid)
        .bind(path)
        .bind(format!("{}/%", escape_like(path)))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to delete properties"))?;
        Ok(result.rows_affected())
    }
}

/// Escape `LIKE` wildcards in a literal prefix.
pub(crate) fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
