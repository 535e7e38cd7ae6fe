//! Database connection pool management.
//!
//! Connection pooling for the SQLite ledger using r2d2. Handles pool
//! initialization, per-connection pragmas, and running migrations.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use gradnet_common::{Error, Result};

use crate::migrations;

/// Type alias for the ledger connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled ledger connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a new ledger pool with the given file path.
///
/// Creates the SQLite file if it doesn't exist, enables foreign keys on
/// every connection, and runs pending migrations.
///
/// # Example
///
/// ```no_run
/// use gradnet_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/gradnet/media.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

/// Initialize an in-memory ledger pool for testing.
///
/// The database is lost when the pool is dropped. Note that each pooled
/// connection opens its own in-memory database; tests that hold a single
/// connection are fine, tests that span connections should use
/// [`init_pool`] with a temp file instead.
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool, converting the r2d2 error into the
/// common Error type.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
