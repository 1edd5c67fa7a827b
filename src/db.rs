//! SQLite connection management for the local index backend.
//!
//! The database file and its parent directories are created on first use.
//! WAL mode is enabled so a running `carag ask` can read while an ingest
//! writes.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use confluence_rag_core::error::{RagError, Result};

/// Open a pool on `db_path`, creating the file if missing.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Index(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(index_err)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(index_err)?;

    Ok(pool)
}

/// Map a driver error into the index error kind.
pub fn index_err(e: sqlx::Error) -> RagError {
    RagError::Index(format!("sqlite: {}", e))
}
