//! Database connection and backend selection.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::migrate;
use crate::storage::{KvBackend, MemoryBackend, SqliteBackend};

/// Sentinel `db.path` that keeps everything in process memory.
pub const MEMORY_PATH: &str = ":memory:";

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(pool)
}

/// Open the key-value backend described by `[db]`.
///
/// `path = ":memory:"` yields a [`MemoryBackend`]; anything else is a SQLite
/// file whose schema is brought up to date before returning.
pub async fn open_backend(config: &Config) -> Result<Arc<dyn KvBackend>> {
    if config.db.path.as_os_str() == MEMORY_PATH {
        return Ok(Arc::new(MemoryBackend::new()));
    }

    let pool = connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteBackend::new(pool)))
}
