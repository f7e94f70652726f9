//! Primary live search API adapter.
//!
//! Sends one `POST` per query. The request body is built from configuration
//! (`query_field`, `limit_field`, `extra_body`), so providers with different
//! request shapes need no code changes:
//!
//! ```json
//! { "query": "tazminat", "page_size": 10 }
//! { "andKelimeler": "tazminat", "page_size": 10 }
//! ```
//!
//! The response goes through the provider's normalizer and is truncated to
//! the requested limit. The overall deadline is applied by the resolver;
//! dropping the future drops the underlying connection.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::PrimarySourceConfig;
use crate::error::SourceError;
use crate::models::{DataSourceTag, ResultItem};
use crate::normalize::{self, Provider};

use super::SearchSource;

pub struct HttpPrimarySource {
    client: reqwest::Client,
    url: String,
    provider: &'static Provider,
    query_field: String,
    limit_field: String,
    extra_body: Map<String, Value>,
}

impl HttpPrimarySource {
    /// Create the adapter from `[sources.primary]`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider id or if the HTTP client
    /// cannot be built.
    pub fn new(config: &PrimarySourceConfig) -> Result<Self> {
        let provider = normalize::lookup(&config.provider)
            .ok_or_else(|| anyhow!("unknown provider: {}", config.provider))?;

        let extra_body = match serde_json::to_value(&config.extra_body)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        // The resolver enforces the per-query deadline; this only bounds
        // the connection handshake.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            provider,
            query_field: config.query_field.clone(),
            limit_field: config.limit_field.clone(),
            extra_body,
        })
    }

    fn request_body(&self, query: &str, limit: usize) -> Value {
        let mut body = self.extra_body.clone();
        body.insert(self.query_field.clone(), Value::from(query.trim()));
        body.insert(self.limit_field.clone(), Value::from(limit));
        Value::Object(body)
    }
}

#[async_trait]
impl SearchSource for HttpPrimarySource {
    fn name(&self) -> &str {
        "primary-api"
    }

    fn tag(&self) -> DataSourceTag {
        DataSourceTag::Primary
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, SourceError> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(query, limit))
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

        let mut items = normalize::normalize_response(self.provider, &body, "result")?;
        items.truncate(limit);
        debug!(url = %self.url, count = items.len(), "primary API answered");
        Ok(items)
    }
}
