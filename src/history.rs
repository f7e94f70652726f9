//! Bounded, de-duplicated log of completed searches.
//!
//! The whole log lives under one key (`search_history`) as a JSON array,
//! most recent first. Every mutation is a read-modify-write, serialized by
//! an async mutex so two resolutions finishing together cannot lose each
//! other's entries.
//!
//! Invariants kept by [`HistoryStore::append`]:
//! - at most `max_entries` entries; the oldest is evicted first;
//! - one entry per query text: a repeated query moves to the front;
//! - with a retention window, entries older than the window are swept.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::history_sync::HistorySync;
use crate::models::{DataSourceTag, HistoryEntry, HistoryStats};
use crate::storage::KvBackend;

const HISTORY_KEY: &str = "search_history";

pub struct HistoryStore {
    backend: Arc<dyn KvBackend>,
    max_entries: usize,
    retention: Option<Duration>,
    sync: Option<HistorySync>,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn KvBackend>, max_entries: usize) -> Self {
        Self {
            backend,
            max_entries: max_entries.max(1),
            retention: None,
            sync: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Sweep entries older than `days` on every append and list. `0` disables.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention = (days > 0).then(|| Duration::days(i64::from(days)));
        self
    }

    /// Push every appended entry to a remote store as well.
    pub fn with_sync(mut self, sync: HistorySync) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn append(
        &self,
        query: &str,
        result_count: usize,
        data_source: DataSourceTag,
        response_time_ms: u64,
    ) -> HistoryEntry {
        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.trim().to_string(),
            created_at: Utc::now(),
            result_count,
            data_source,
            response_time_ms,
        };

        {
            let _guard = self.write_lock.lock().await;
            let mut entries = self.load().await;
            entries.retain(|e| e.query != entry.query);
            entries.insert(0, entry.clone());
            self.sweep(&mut entries);
            entries.truncate(self.max_entries);
            self.save(&entries).await;
        }

        if let Some(sync) = &self.sync {
            sync.push(entry.clone());
        }

        entry
    }

    /// Wait for outstanding remote uploads; a no-op without `[sync]`.
    pub async fn flush_sync(&self, timeout: std::time::Duration) {
        if let Some(sync) = &self.sync {
            sync.flush(timeout).await;
        }
    }

    /// Returns `true` when an entry was removed.
    pub async fn remove(&self, id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return false;
        }
        self.save(&entries).await;
        true
    }

    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.backend.delete(HISTORY_KEY).await {
            warn!(error = %e, "failed to clear search history");
        }
    }

    /// Up to `limit` entries, most recent first.
    pub async fn list(&self, limit: usize) -> Vec<HistoryEntry> {
        let mut entries = self.current().await;
        entries.truncate(limit);
        entries
    }

    pub async fn recent_queries(&self, limit: usize) -> Vec<String> {
        self.list(limit).await.into_iter().map(|e| e.query).collect()
    }

    pub async fn size(&self) -> usize {
        self.current().await.len()
    }

    pub async fn stats(&self) -> HistoryStats {
        let entries = self.current().await;
        let mut by_source: BTreeMap<DataSourceTag, usize> =
            DataSourceTag::ALL.iter().map(|t| (*t, 0)).collect();

        let mut total_time = 0u64;
        let mut total_results = 0usize;
        for e in &entries {
            *by_source.entry(e.data_source).or_insert(0) += 1;
            total_time += e.response_time_ms;
            total_results += e.result_count;
        }

        let (average_response_time_ms, average_result_count) = if entries.is_empty() {
            (0.0, 0.0)
        } else {
            let n = entries.len() as f64;
            (total_time as f64 / n, total_results as f64 / n)
        };

        HistoryStats {
            total: entries.len(),
            by_source,
            average_response_time_ms,
            average_result_count,
        }
    }

    /// Entries with the retention sweep applied; persisted if anything aged out.
    async fn current(&self) -> Vec<HistoryEntry> {
        if self.retention.is_none() {
            return self.load().await;
        }
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await;
        let before = entries.len();
        self.sweep(&mut entries);
        if entries.len() != before {
            self.save(&entries).await;
        }
        entries
    }

    fn sweep(&self, entries: &mut Vec<HistoryEntry>) {
        if let Some(retention) = self.retention {
            let cutoff = Utc::now() - retention;
            entries.retain(|e| e.created_at >= cutoff);
        }
    }

    async fn load(&self) -> Vec<HistoryEntry> {
        let raw = match self.backend.get(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "history read failed");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "history is unreadable, starting over");
            Vec::new()
        })
    }

    async fn save(&self, entries: &[HistoryEntry]) {
        let raw = match serde_json::to_string(entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "history not serializable");
                return;
            }
        };
        if let Err(e) = self.backend.put(HISTORY_KEY, &raw).await {
            warn!(error = %e, "history write failed");
        }
    }
}
