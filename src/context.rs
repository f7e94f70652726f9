//! Explicitly constructed application context.
//!
//! Owns the storage backend, both stores, the community dataset and the
//! resolver. Built once from a [`Config`] at startup and passed to whatever
//! needs it; there is no global state.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::db;
use crate::history::HistoryStore;
use crate::history_sync::HistorySync;
use crate::resolver::{ResolveOptions, Resolver};
use crate::sources::{CommunityDataset, CommunitySource, HttpPrimarySource, StaticFallbackSource};
use crate::storage::KvBackend;

pub struct SearchContext {
    pub backend: Arc<dyn KvBackend>,
    pub cache: Arc<CacheStore>,
    pub history: Arc<HistoryStore>,
    pub dataset: Arc<CommunityDataset>,
    pub resolver: Resolver,
}

impl SearchContext {
    /// Open the backend named in `[db]` and wire every configured source.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let backend = db::open_backend(config).await?;
        Self::with_backend(config, backend).await
    }

    /// Wire the context over an already opened backend.
    pub async fn with_backend(config: &Config, backend: Arc<dyn KvBackend>) -> Result<Self> {
        let cache = Arc::new(CacheStore::new(
            backend.clone(),
            std::time::Duration::from_secs(config.cache.ttl_secs),
        ));

        let mut history = HistoryStore::new(backend.clone(), config.history.max_entries)
            .with_retention_days(config.history.retention_days);
        if let Some(sync_config) = &config.sync {
            match HistorySync::from_config(sync_config) {
                Ok(sync) => history = history.with_sync(sync),
                Err(e) => warn!(error = %e, "history sync disabled"),
            }
        }
        let history = Arc::new(history);

        let dataset = Arc::new(
            CommunityDataset::new(&config.sources.community, backend.clone())
                .context("Failed to set up community dataset")?,
        );
        let restored = dataset.load_snapshot().await;
        debug!(items = restored, "community snapshot restored");

        let mut resolver = Resolver::new(cache.clone(), history.clone())
            .with_options(ResolveOptions::from_config(config))
            .with_secondary(Arc::new(CommunitySource::new(dataset.clone())));

        if let Some(primary) = &config.sources.primary {
            let source = HttpPrimarySource::new(primary).context("Failed to set up primary source")?;
            resolver = resolver.with_primary(Arc::new(source));
        }
        if let Some(fallback) = &config.sources.fallback {
            let source =
                StaticFallbackSource::new(fallback).context("Failed to set up fallback source")?;
            resolver = resolver.with_fallback(Arc::new(source));
        }

        Ok(Self {
            backend,
            cache,
            history,
            dataset,
            resolver,
        })
    }
}
