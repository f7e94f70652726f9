//! Time-expiring cache of resolved result sets.
//!
//! Entries are keyed by `(normalized query, result limit)` and stored as JSON
//! under `search_cache:<query>:<limit>` in the [`KvBackend`]. There is no
//! eviction beyond TTL: expired entries are removed lazily when a lookup
//! touches them.
//!
//! Storage failures never abort a search. They are logged and the cache
//! behaves as if the entry were absent.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use crate::models::{normalize_query, CacheEntry, DataSourceTag, ResultItem};
use crate::storage::KvBackend;

const KEY_PREFIX: &str = "search_cache:";

pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
}

fn cache_key(query: &str, limit: usize) -> String {
    format!("{}{}:{}", KEY_PREFIX, normalize_query(query), limit)
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>, ttl: std::time::Duration) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(30));
        Self { backend, ttl }
    }

    /// Live entry for `(query, limit)`. Expired entries are deleted and
    /// reported as absent.
    pub async fn get(&self, query: &str, limit: usize) -> Option<CacheEntry> {
        let key = cache_key(query, limit);
        let entry = self.read(&key).await?;
        if entry.is_expired_at(Utc::now()) {
            self.remove_key(&key).await;
            return None;
        }
        Some(entry)
    }

    /// Entry for `(query, limit)` regardless of expiry. Nothing is deleted.
    ///
    /// Only used as the last resort once every live source has failed.
    pub async fn get_stale(&self, query: &str, limit: usize) -> Option<CacheEntry> {
        self.read(&cache_key(query, limit)).await
    }

    /// Overwrite the entry for `(query, limit)` with a fresh expiry.
    pub async fn set(
        &self,
        query: &str,
        results: &[ResultItem],
        data_source: DataSourceTag,
        limit: usize,
    ) {
        let now = Utc::now();
        let entry = CacheEntry {
            query: query.trim().to_string(),
            result_limit: limit,
            results: results.to_vec(),
            data_source,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.write(&cache_key(query, limit), &entry).await;
    }

    pub async fn clear(&self) -> u64 {
        match self.backend.delete_prefix(KEY_PREFIX).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to clear search cache");
                0
            }
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn size(&self) -> usize {
        match self.backend.keys(KEY_PREFIX).await {
            Ok(keys) => keys.len(),
            Err(e) => {
                warn!(error = %e, "failed to count cache entries");
                0
            }
        }
    }

    /// All live entries, newest first. Expired entries met on the way are
    /// deleted.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let keys = match self.backend.keys(KEY_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list cache entries");
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut live = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.read(&key).await {
                if entry.is_expired_at(now) {
                    self.remove_key(&key).await;
                } else {
                    live.push(entry);
                }
            }
        }
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        live
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn read(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "dropping unreadable cache entry");
                self.remove_key(key).await;
                None
            }
        }
    }

    async fn write(&self, key: &str, entry: &CacheEntry) {
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "cache entry not serializable");
                return;
            }
        };
        if let Err(e) = self.backend.put(key, &raw).await {
            warn!(key, error = %e, "cache write failed");
        }
    }

    async fn remove_key(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!(key, error = %e, "cache delete failed");
        }
    }
}
