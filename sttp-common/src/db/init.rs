//! Database initialization
//!
//! Opens (or creates) a SQLite database file and returns a connection pool.
//! Table creation belongs to the repositories that own the tables; this
//! module only prepares the connection.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
const BUSY_TIMEOUT_MS: u64 = 250;

/// Open or create the database at `db_path`
///
/// Enables WAL journaling so the status API can read while a cycle writes.
/// Lock waits are kept short here; longer contention is absorbed by
/// [`retry_on_lock`](crate::db::retry_on_lock).
pub async fn init_pool(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Verify the pool can serve a trivial query
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool_creates_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("jobs.db");

        let pool = init_pool(&db_path).await.unwrap();
        ping(&pool).await.unwrap();

        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_init_pool_reopens_existing() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("jobs.db");

        let pool = init_pool(&db_path).await.unwrap();
        sqlx::query("CREATE TABLE marker (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let reopened = init_pool(&db_path).await.unwrap();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'marker'",
        )
        .fetch_one(&reopened)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
