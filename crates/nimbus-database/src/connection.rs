//! PostgreSQL connection pool management.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use nimbus_core::config::database::DatabaseConfig;
use nimbus_core::error::{AppError, ErrorKind};

use crate::migration::run_migrations;

/// Shared PostgreSQL pool used by every store in this crate.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool and, when configured, apply pending migrations.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %redact_url(&config.url),
            max_connections = config.max_connections,
            "Opening PostgreSQL pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to open database pool: {e}"),
                    e,
                )
            })?;

        if config.run_migrations {
            run_migrations(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Borrow the sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Database ping failed", e))
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Replace the password of a connection URL with `****` for logging.
fn redact_url(url: &str) -> String {
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    let credentials_start = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url[credentials_start..at].find(':') {
        Some(colon) => {
            let colon = credentials_start + colon;
            format!("{}:****{}", &url[..colon], &url[at..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://nimbus:s3cret@db:5432/nimbus"),
            "postgres://nimbus:****@db:5432/nimbus"
        );
        assert_eq!(
            redact_url("postgres://nimbus@db/nimbus"),
            "postgres://nimbus@db/nimbus"
        );
        assert_eq!(redact_url("postgres://db/nimbus"), "postgres://db/nimbus");
    }
}
