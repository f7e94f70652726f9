//! Best-effort push of history entries to a remote REST store.
//!
//! When `[sync]` is configured, every entry appended to the History Store is
//! also inserted into a remote table (PostgREST-style
//! `POST <url>/rest/v1/<table>`) under the configured user id. The push runs
//! on a spawned task: a resolution never waits for it, and failures are only
//! logged. Short-lived callers such as the CLI call [`HistorySync::flush`]
//! before the runtime shuts down so pending uploads are not dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::models::HistoryEntry;

#[derive(Clone)]
pub struct HistorySync {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    user_id: String,
    pending: Arc<Mutex<JoinSet<()>>>,
}

/// Row shape of the remote `user_searches` table.
#[derive(Debug, Serialize)]
struct RemoteSearchRow<'a> {
    user_id: &'a str,
    query: &'a str,
    results_count: usize,
    search_date: String,
    data_source: &'a str,
    response_time: u64,
    filters: serde_json::Value,
}

impl HistorySync {
    /// Build a sync client from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the API key environment variable is not set.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.url.trim_end_matches('/'),
                config.table
            ),
            api_key,
            user_id: config.user_id.clone(),
            pending: Arc::new(Mutex::new(JoinSet::new())),
        })
    }

    /// Start the upload of one entry without waiting for it.
    pub fn push(&self, entry: HistoryEntry) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, skipping history sync");
            return;
        };
        let this = self.clone();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        while pending.try_join_next().is_some() {}
        pending.spawn_on(
            async move {
                if let Err(e) = this.upload(&entry).await {
                    warn!(query = %entry.query, error = %e, "history sync failed");
                }
            },
            &handle,
        );
    }

    /// Wait up to `timeout` for every upload started so far.
    ///
    /// Uploads still running at the deadline are aborted and logged.
    pub async fn flush(&self, timeout: Duration) {
        let mut pending = {
            let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        if pending.is_empty() {
            return;
        }

        let drain = async { while pending.join_next().await.is_some() {} };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                remaining = pending.len(),
                timeout_ms = timeout.as_millis() as u64,
                "history sync did not finish in time"
            );
        }
    }

    async fn upload(&self, entry: &HistoryEntry) -> Result<()> {
        let row = RemoteSearchRow {
            user_id: &self.user_id,
            query: &entry.query,
            results_count: entry.result_count,
            search_date: entry.created_at.to_rfc3339(),
            data_source: entry.data_source.as_str(),
            response_time: entry.response_time_ms,
            filters: serde_json::json!({}),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("remote store error {}: {}", status, body);
        }

        debug!(query = %entry.query, "history entry synced");
        Ok(())
    }
}
