//! PostgreSQL phone-book matches.

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;

use crate::traits::KnownUserStore;

/// [`KnownUserStore`] backed by the `known_users` table.
#[derive(Debug, Clone)]
pub struct PgKnownUserStore {
    pool: PgPool,
}

impl PgKnownUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnownUserStore for PgKnownUserStore {
    async fn is_known_to_user(&self, known_to: &str, uid: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM known_users WHERE known_to = $1 AND known_user = $2)",
        )
        .bind(known_to)
        .bind(uid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to query known users", e))
    }
}
