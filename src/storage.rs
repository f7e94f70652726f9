//! Key-value persistence medium for the Cache and History stores.
//!
//! The [`KvBackend`] trait is the storage boundary: string keys under a
//! namespace prefix, JSON string values. Two implementations ship:
//!
//! - [`MemoryBackend`]: `BTreeMap` behind a `RwLock`, for tests and
//!   ephemeral sessions.
//! - [`SqliteBackend`]: a single `kv_store` table in the SQLite database
//!   created by `hls init`.
//!
//! Callers treat every error from this layer as "store unavailable": they
//! log it and carry on as if the key were absent.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

/// Abstract key-value storage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](KvBackend::get) | Read one value |
/// | [`put`](KvBackend::put) | Insert or overwrite one value |
/// | [`delete`](KvBackend::delete) | Remove one key |
/// | [`keys`](KvBackend::keys) | List keys under a prefix |
/// | [`delete_prefix`](KvBackend::delete_prefix) | Remove every key under a prefix |
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Returns the number of removed keys.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;
}

// ============ In-memory backend ============

/// In-memory backend for tests and sessions without a database.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("memory backend lock poisoned")
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

// ============ SQLite backend ============

/// SQLite implementation of [`KvBackend`] over the `kv_store` table.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Escape `%` and `_` so a key prefix can be used in a `LIKE` pattern.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl KvBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM kv_store WHERE key LIKE ? ESCAPE '\\' ORDER BY key")
            .bind(like_prefix(prefix))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key LIKE ? ESCAPE '\\'")
            .bind(like_prefix(prefix))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
