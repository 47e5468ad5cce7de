//! `SQLite` pool construction shared by the repositories.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::Result;

/// Connections per file-backed pool.
const FILE_POOL_SIZE: u32 = 5;

/// Opens (creating if needed) the database file at `path`.
pub(crate) async fn open_file(path: &str) -> Result<SqlitePool> {
    debug!(path, "Opening database");
    connect(&format!("sqlite:{path}?mode=rwc"), FILE_POOL_SIZE).await
}

/// A private in-memory database.
///
/// Every connection to `sqlite::memory:` is its own database, so the pool
/// holds exactly one.
pub(crate) async fn open_memory() -> Result<SqlitePool> {
    connect("sqlite::memory:", 1).await
}

async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?)
}
