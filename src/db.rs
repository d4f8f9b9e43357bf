//! Database pool construction and health probing

use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

use crate::config::{DatabaseConfig, PoolConfig};
use crate::error::{Error, Result};

/// Connect to MySQL with the configured pool bounds.
///
/// Fails fast if the database is unreachable so the binaries can exit with
/// the storage-unreachable code at startup.
pub async fn connect(database: &DatabaseConfig, pool: &PoolConfig) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .min_connections(pool.min_connections)
        .max_connections(pool.max_connections())
        .acquire_timeout(pool.acquire_timeout)
        .connect(&database.url())
        .await
        .map_err(|e| Error::Unavailable(format!("database connect failed: {}", e)))?;

    Ok(pool)
}

/// Apply embedded migrations.
pub async fn migrate(pool: &MySqlPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Internal(format!("migration failed: {}", e)))?;
    Ok(())
}

/// Probe the database with a trivial query under a bounded timeout.
pub async fn health_probe(pool: &MySqlPool, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool)).await,
        Ok(Ok(_))
    )
}
