//! PostgreSQL calendar proxy delegations.

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::proxy::Proxy;

use crate::traits::ProxyStore;

/// [`ProxyStore`] backed by the `calendar_proxy` table.
#[derive(Debug, Clone)]
pub struct PgProxyStore {
    pool: PgPool,
}

impl PgProxyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProxyStore for PgProxyStore {
    async fn proxies_of(&self, owner_id: &str) -> AppResult<Vec<Proxy>> {
        sqlx::query_as::<_, Proxy>("SELECT * FROM calendar_proxy WHERE owner_id = $1 ORDER BY id")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list proxies", e))
    }

    async fn proxies_for(&self, proxy_id: &str) -> AppResult<Vec<Proxy>> {
        sqlx::query_as::<_, Proxy>("SELECT * FROM calendar_proxy WHERE proxy_id = $1 ORDER BY id")
            .bind(proxy_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list proxies", e))
    }

    async fn insert(&self, proxy: &Proxy) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO calendar_proxy (owner_id, proxy_id, permissions) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&proxy.owner_id)
        .bind(&proxy.proxy_id)
        .bind(proxy.permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to store proxy", e))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM calendar_proxy WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete proxy", e))?;
        Ok(result.rows_affected() > 0)
    }
}
