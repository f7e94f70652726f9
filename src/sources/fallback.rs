//! Static fallback dataset adapter.
//!
//! Fetches one static JSON document with `GET`, keeps it for the lifetime of
//! the process, and answers every query by local ranking. A failed fetch is
//! not memoized: the next resolution that reaches this source retries.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::FallbackSourceConfig;
use crate::error::SourceError;
use crate::models::{DataSourceTag, ResultItem};
use crate::normalize::{self, Provider};

use super::{ranking, SearchSource};

pub struct StaticFallbackSource {
    client: reqwest::Client,
    url: String,
    provider: &'static Provider,
    dataset: OnceCell<Vec<ResultItem>>,
}

impl StaticFallbackSource {
    pub fn new(config: &FallbackSourceConfig) -> Result<Self> {
        let provider = normalize::lookup(&config.provider)
            .ok_or_else(|| anyhow!("unknown provider: {}", config.provider))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            provider,
            dataset: OnceCell::new(),
        })
    }

    /// Whether the dataset has been fetched already.
    pub fn is_loaded(&self) -> bool {
        self.dataset.initialized()
    }

    async fn dataset(&self) -> Result<&[ResultItem], SourceError> {
        let items = self
            .dataset
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(&self.url)
                    .header("Accept", "application/json")
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
                let items = normalize::normalize_response(self.provider, &body, "result")?;
                info!(url = %self.url, count = items.len(), "fallback dataset loaded");
                Ok::<_, SourceError>(items)
            })
            .await?;
        Ok(items.as_slice())
    }
}

#[async_trait]
impl SearchSource for StaticFallbackSource {
    fn name(&self) -> &str {
        "static-fallback"
    }

    fn tag(&self) -> DataSourceTag {
        DataSourceTag::Fallback
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, SourceError> {
        let dataset = self.dataset().await?;
        Ok(ranking::rank(dataset, query, limit))
    }
}
