//! PostgreSQL account directory.

use async_trait::async_trait;
use sqlx::PgPool;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::user::User;

use crate::traits::UserBackend;

/// [`UserBackend`] backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserBackend {
    pool: PgPool,
}

impl PgUserBackend {
    /// Create a new account directory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserBackend for PgUserBackend {
    async fn get(&self, uid: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY uid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list users", e))
    }

    async fn search_display_name(
        &self,
        pattern: &str,
        limit: Option<usize>,
    ) -> AppResult<Vec<User>> {
        let like = format!("%{}%", escape_like(pattern));
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE uid ILIKE $1 OR display_name ILIKE $1 \
             ORDER BY uid LIMIT $2",
        )
        .bind(like)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to search users", e))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1) ORDER BY uid")
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find users by email", e)
            })
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (uid, display_name, email, additional_emails, language, \
             share_folder, password_hash, enabled) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (uid) DO UPDATE SET display_name = EXCLUDED.display_name, \
             email = EXCLUDED.email, additional_emails = EXCLUDED.additional_emails, \
             language = EXCLUDED.language, share_folder = EXCLUDED.share_folder, \
             password_hash = EXCLUDED.password_hash, enabled = EXCLUDED.enabled",
        )
        .bind(&user.uid)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.additional_emails)
        .bind(&user.language)
        .bind(&user.share_folder)
        .bind(&user.password_hash)
        .bind(user.enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save user", e))?;
        Ok(())
    }

    async fn delete(&self, uid: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE uid = $1")
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
