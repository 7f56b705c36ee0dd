pub mod migrations;
pub mod models;
pub mod repos;
pub mod schema;

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseConfig;
use crate::error::AppError;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection customizer that sets per-connection SQLite pragmas.
#[derive(Debug)]
struct SqlitePragmaCustomizer {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<rusqlite::Connection, rusqlite::Error> for SqlitePragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {};
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

/// Open the database and reconcile its schema with the registered entities.
///
/// Runs once at startup, before any traffic is served. A reconciliation
/// failure is returned as-is so the caller can abort startup.
pub fn init_db(config: &DatabaseConfig, cancel: &CancellationToken) -> Result<DbPool, AppError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.path.display(), "Initializing database");

    let manager = SqliteConnectionManager::file(&config.path);
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_customizer(Box::new(SqlitePragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;

    // Set WAL journal mode (database-wide, only needs to run once)
    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!("SQLite pragmas configured (WAL, FK, busy_timeout)");
    }

    {
        let conn = pool.get()?;
        let report = migrations::reconcile(&conn, &models::entities(), cancel)?;
        tracing::info!(
            tables_created = report.tables_created.len(),
            columns_added = report.columns_added.len(),
            "Database schema up to date"
        );
    }

    tracing::info!(max_connections = config.max_connections, "Database initialized successfully");
    Ok(pool)
}

#[cfg(test)]
pub fn init_test_db() -> Result<DbPool, AppError> {
    use std::time::Duration;

    // Use a unique temp file for each test to avoid in-memory connection issues with r2d2.
    let tmp = std::env::temp_dir().join(format!("starter_test_{}.db", uuid::Uuid::new_v4()));
    let manager = SqliteConnectionManager::file(&tmp);
    let pool = Pool::builder()
        .max_size(2)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(SqlitePragmaCustomizer {
            busy_timeout_ms: 5000,
        }))
        .build(manager)?;

    let conn = pool.get()?;
    migrations::reconcile(&conn, &models::entities(), &CancellationToken::new())?;
    drop(conn);
    Ok(pool)
}
