//! Community dataset: the secondary tier of the degradation chain.
//!
//! Unlike the primary API, this source issues no request per query. A set of
//! published JSON datasets (legislation, court decisions) is fetched ahead of
//! time by [`CommunityDataset::refresh`], held in memory, and snapshotted to
//! the key-value backend so the next process starts with data already
//! loaded. Queries are answered by local ranking over the loaded items.
//!
//! The dataset is `active` only while it holds at least one item; the
//! resolver skips the tier otherwise.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{CommunityConfig, DatasetConfig};
use crate::error::SourceError;
use crate::models::{DataSourceTag, ResultItem};
use crate::normalize;
use crate::storage::KvBackend;

use super::{ranking, SearchSource};

const SNAPSHOT_KEY: &str = "community_dataset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    Active,
    Loading,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    items: Vec<ResultItem>,
    updated_at: DateTime<Utc>,
}

struct DatasetState {
    items: Vec<ResultItem>,
    status: DatasetStatus,
    updated_at: Option<DateTime<Utc>>,
}

/// Outcome of one [`CommunityDataset::refresh`].
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub loaded: Vec<(String, usize)>,
    pub failed: Vec<(String, String)>,
    pub status: DatasetStatus,
}

pub struct CommunityDataset {
    client: reqwest::Client,
    datasets: Vec<DatasetConfig>,
    backend: Arc<dyn KvBackend>,
    state: RwLock<DatasetState>,
}

impl CommunityDataset {
    pub fn new(config: &CommunityConfig, backend: Arc<dyn KvBackend>) -> Result<Self> {
        for d in &config.datasets {
            if normalize::lookup(&d.provider).is_none() {
                return Err(anyhow!("dataset '{}': unknown provider {}", d.name, d.provider));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            datasets: config.datasets.clone(),
            backend,
            state: RwLock::new(DatasetState {
                items: Vec::new(),
                status: DatasetStatus::Loading,
                updated_at: None,
            }),
        })
    }

    pub fn status(&self) -> DatasetStatus {
        self.state
            .read()
            .map(|s| s.status)
            .unwrap_or(DatasetStatus::Error)
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().ok().and_then(|s| s.updated_at)
    }

    /// Replace the loaded items. Status becomes `active` when non-empty.
    pub fn replace_items(&self, items: Vec<ResultItem>, updated_at: DateTime<Utc>) {
        if let Ok(mut state) = self.state.write() {
            state.status = if items.is_empty() {
                DatasetStatus::Error
            } else {
                DatasetStatus::Active
            };
            state.items = items;
            state.updated_at = Some(updated_at);
        }
    }

    /// Restore the last persisted snapshot, if any.
    ///
    /// Returns the number of restored items.
    pub async fn load_snapshot(&self) -> usize {
        let raw = match self.backend.get(SNAPSHOT_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, "community snapshot read failed");
                return 0;
            }
        };
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => {
                let n = snapshot.items.len();
                self.replace_items(snapshot.items, snapshot.updated_at);
                n
            }
            Err(e) => {
                warn!(error = %e, "community snapshot unreadable");
                0
            }
        }
    }

    /// Fetch every configured dataset and swap in the combined items.
    ///
    /// Datasets that fail are reported and skipped. When all of them fail,
    /// the previously loaded items are kept.
    pub async fn refresh(&self) -> RefreshReport {
        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        let mut items = Vec::new();

        for dataset in &self.datasets {
            match self.fetch(dataset).await {
                Ok(fetched) => {
                    info!(dataset = %dataset.name, count = fetched.len(), "community dataset fetched");
                    loaded.push((dataset.name.clone(), fetched.len()));
                    items.extend(fetched);
                }
                Err(e) => {
                    warn!(dataset = %dataset.name, error = %e, "community dataset fetch failed");
                    failed.push((dataset.name.clone(), e.to_string()));
                }
            }
        }

        if !items.is_empty() {
            let now = Utc::now();
            self.persist(&items, now).await;
            self.replace_items(items, now);
        } else if self.is_empty() {
            if let Ok(mut state) = self.state.write() {
                state.status = DatasetStatus::Error;
            }
        }

        RefreshReport {
            loaded,
            failed,
            status: self.status(),
        }
    }

    /// Rank the loaded items against `query`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ResultItem> {
        match self.state.read() {
            Ok(state) => ranking::rank(&state.items, query, limit),
            Err(_) => Vec::new(),
        }
    }

    async fn fetch(&self, dataset: &DatasetConfig) -> Result<Vec<ResultItem>, SourceError> {
        let provider = normalize::lookup(&dataset.provider)
            .ok_or_else(|| SourceError::Unavailable(format!("unknown provider {}", dataset.provider)))?;

        let response = self
            .client
            .get(&dataset.url)
            .header("Accept", "application/json")
            .header("Cache-Control", "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        normalize::normalize_response(provider, &body, &dataset.name)
    }

    async fn persist(&self, items: &[ResultItem], updated_at: DateTime<Utc>) {
        let snapshot = Snapshot {
            items: items.to_vec(),
            updated_at,
        };
        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "community snapshot not serializable");
                return;
            }
        };
        if let Err(e) = self.backend.put(SNAPSHOT_KEY, &raw).await {
            warn!(error = %e, "community snapshot write failed");
        }
    }
}

/// [`SearchSource`] view of a shared [`CommunityDataset`].
pub struct CommunitySource {
    dataset: Arc<CommunityDataset>,
}

impl CommunitySource {
    pub fn new(dataset: Arc<CommunityDataset>) -> Self {
        Self { dataset }
    }
}

#[async_trait]
impl SearchSource for CommunitySource {
    fn name(&self) -> &str {
        "community-data"
    }

    fn tag(&self) -> DataSourceTag {
        DataSourceTag::Secondary
    }

    fn is_available(&self) -> bool {
        self.dataset.status() == DatasetStatus::Active
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, SourceError> {
        if !self.is_available() {
            return Err(SourceError::Unavailable("community dataset not loaded".into()));
        }
        Ok(self.dataset.search(query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn item(id: &str, title: &str) -> ResultItem {
        ResultItem {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            date: None,
            item_type: "mevzuat".into(),
            url: None,
            relevance: 0.0,
        }
    }

    fn dataset(backend: Arc<MemoryBackend>) -> CommunityDataset {
        CommunityDataset::new(&CommunityConfig::default(), backend).unwrap()
    }

    #[tokio::test]
    async fn test_inactive_until_items_loaded() {
        let ds = Arc::new(dataset(Arc::new(MemoryBackend::new())));
        let source = CommunitySource::new(ds.clone());
        assert_eq!(ds.status(), DatasetStatus::Loading);
        assert!(!source.is_available());
        assert!(matches!(
            source.search("kira", 10).await,
            Err(SourceError::Unavailable(_))
        ));

        ds.replace_items(vec![item("1", "Kira sözleşmesi")], Utc::now());
        assert!(source.is_available());
        assert_eq!(source.search("kira", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_restores_items() {
        let backend = Arc::new(MemoryBackend::new());
        let first = dataset(backend.clone());
        first
            .persist(&[item("1", "Kira"), item("2", "Vergi")], Utc::now())
            .await;

        let second = dataset(backend);
        assert_eq!(second.load_snapshot().await, 2);
        assert_eq!(second.status(), DatasetStatus::Active);
        assert_eq!(second.search("vergi", 10)[0].id, "2");
    }

    #[tokio::test]
    async fn test_refresh_without_datasets_marks_error() {
        let ds = dataset(Arc::new(MemoryBackend::new()));
        let report = ds.refresh().await;
        assert!(report.loaded.is_empty());
        assert_eq!(report.status, DatasetStatus::Error);
    }
}
