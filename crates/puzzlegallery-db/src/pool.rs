//! Connection pool management for SQLite via r2d2.
//!
//! This module handles pool initialization, per-connection setup and running
//! migrations.

use std::time::Duration;

use puzzlegallery_common::{Error, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Tuning knobs for [`init_pool_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of pooled connections.
    pub max_size: u32,
    /// How long to wait for a free connection before failing.
    pub connection_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Initialize a database pool backed by a file on disk with default options.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    init_pool_with(db_path, PoolOptions::default())
}

/// Initialize a database pool backed by a file on disk.
///
/// Creates the SQLite file if it does not exist, sets WAL journal mode and
/// the busy timeout on every new connection, and runs pending migrations.
///
/// # Example
///
/// ```no_run
/// use puzzlegallery_db::pool::{init_pool_with, PoolOptions};
///
/// let pool = init_pool_with("/var/lib/puzzlegallery/gallery.db", PoolOptions::default()).unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool_with(db_path: &str, options: PoolOptions) -> Result<DbPool> {
    let busy_timeout = options.busy_timeout;
    let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
    });

    let pool = Pool::builder()
        .max_size(options.max_size)
        .connection_timeout(options.connection_timeout)
        .build(manager)
        .map_err(|e| Error::connection(format!("Failed to create connection pool: {e}")))?;

    migrate(&pool)?;

    tracing::debug!(path = db_path, max_size = options.max_size, "database pool ready");
    Ok(pool)
}

/// Initialize an in-memory database pool (useful for tests).
///
/// Each call creates a uniquely-named shared-cache in-memory database so
/// that parallel tests do not interfere with each other. The pool holds a
/// single connection: shared-cache databases use table-level locks that
/// report `SQLITE_LOCKED` instead of waiting, so callers are serialized at
/// the pool instead.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:gallerydb_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri);

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::connection(format!("Failed to create in-memory pool: {e}")))?;

    migrate(&pool)?;

    Ok(pool)
}

/// Convenience helper to get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::connection(format!("Failed to get connection from pool: {e}")))
}

fn migrate(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {e}")))?;

    Ok(())
}
