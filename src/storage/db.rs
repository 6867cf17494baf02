use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;

use crate::core::error::AppResult;
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// How long a writer waits for a competing `IMMEDIATE` transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection setup applied by the pool and by [`open_connection`].
fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )
}

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections, every connection in
/// WAL mode with a busy timeout, and applies pending migrations.
///
/// # Example
///
/// ```no_run
/// use refmarket::storage::db;
///
/// let pool = db::create_pool("refmarket.sqlite")?;
/// # Ok::<(), refmarket::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| configure(conn));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Opens a standalone, migrated connection. Used by the CLI and tests.
pub fn open_connection(database_path: &str) -> AppResult<Connection> {
    let mut conn = Connection::open(database_path)?;
    configure(&conn)?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

/// In-memory database with the full schema.
pub fn open_in_memory() -> AppResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    run_migrations(&mut conn)?;
    Ok(conn)
}
