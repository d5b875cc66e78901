//! SQLite connection pool.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use smm_core::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const POOL_SIZE: u32 = 8;

/// Writers wait this long for a lock instead of failing with SQLITE_BUSY.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Open (or create) the database file at `db_path` and run pending
/// migrations.
///
/// Every connection gets foreign keys, WAL journaling and a busy timeout.
pub fn init_pool(db_path: &Path) -> Result<DbPool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))
    });

    let pool = build(manager)?;
    tracing::info!(path = %db_path.display(), "Opened course database");
    Ok(pool)
}

/// In-memory database for tests.
///
/// Each call gets its own shared-cache database, so connections of one pool
/// see the same data while separate pools stay isolated.
pub fn init_memory_pool() -> Result<DbPool> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:smmdb_mem_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri).with_init(|conn| {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))
    });

    build(manager)
}

fn build(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;
    Ok(pool)
}

/// Check a connection out of the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {e}")))
}
