//! Multi-source search resolution.
//!
//! The resolver walks a fixed degradation chain, one source at a time,
//! until one of them satisfies the query:
//!
//! ```text
//! query ──▶ [cache-first?] ──▶ primary ──▶ secondary ──▶ fallback ──▶ stale cache ──▶ error
//!                │               │            │             │             │
//!                └───────────────┴────────────┴─────────────┴─────────────┴──▶ history (exactly once)
//! ```
//!
//! A source "does not satisfy" the query when it times out, fails, is
//! unavailable, or returns nothing. Those cases only differ in logs. Every
//! satisfying live source writes its results through to the Cache Store, and
//! every completed resolution, successful or not, appends exactly one
//! History Store entry.
//!
//! Concurrent calls for the same `(normalized query, limit)` share a single
//! in-flight resolution, so overlapping callers never double-write history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{ResolveError, SourceError};
use crate::history::HistoryStore;
use crate::models::{normalize_query, DataSourceTag, PerformanceInfo, ResultItem, SearchOutcome};
use crate::sources::SearchSource;

/// Per-call switches of the degradation chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Permits any read or write of the Cache Store.
    pub cache_enabled: bool,
    /// Serve a live cache entry before any network attempt.
    pub cache_first: bool,
    /// Client is known to be offline; behaves like `cache_first`.
    pub offline: bool,
    /// Deadline for the primary source; the request is dropped when it elapses.
    pub primary_timeout: Duration,
    /// Permits the static fallback and the stale-cache last resort.
    pub fallback_enabled: bool,
    /// Permits the secondary (community data) source.
    pub secondary_enabled: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_first: false,
            offline: false,
            primary_timeout: Duration::from_millis(5000),
            fallback_enabled: true,
            secondary_enabled: true,
        }
    }
}

impl ResolveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_enabled: config.cache.enabled,
            cache_first: config.cache.first,
            offline: false,
            primary_timeout: config.primary_timeout(),
            fallback_enabled: config.fallback_enabled(),
            secondary_enabled: config.sources.community.enabled,
        }
    }
}

type SharedResolution = Arc<OnceCell<Result<SearchOutcome, ResolveError>>>;

pub struct Resolver {
    primary: Option<Arc<dyn SearchSource>>,
    secondary: Option<Arc<dyn SearchSource>>,
    fallback: Option<Arc<dyn SearchSource>>,
    cache: Arc<CacheStore>,
    history: Arc<HistoryStore>,
    defaults: ResolveOptions,
    in_flight: Mutex<HashMap<(String, usize), SharedResolution>>,
}

/// Which link of the chain a source occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Primary,
    Secondary,
    Fallback,
}

impl Resolver {
    pub fn new(cache: Arc<CacheStore>, history: Arc<HistoryStore>) -> Self {
        Self {
            primary: None,
            secondary: None,
            fallback: None,
            cache,
            history,
            defaults: ResolveOptions::default(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_primary(mut self, source: Arc<dyn SearchSource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_secondary(mut self, source: Arc<dyn SearchSource>) -> Self {
        self.secondary = Some(source);
        self
    }

    pub fn with_fallback(mut self, source: Arc<dyn SearchSource>) -> Self {
        self.fallback = Some(source);
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.defaults = options;
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.defaults
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Resolve with the default options.
    pub async fn resolve(&self, query: &str, limit: usize) -> Result<SearchOutcome, ResolveError> {
        let options = self.defaults.clone();
        self.resolve_with(query, limit, &options).await
    }

    /// Resolve `query`, returning at most `limit` results.
    ///
    /// An empty or whitespace-only query returns an empty outcome without
    /// touching Cache or History.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Exhausted`] when every source failed and no stale
    /// cache entry was available. One `error` history entry is recorded.
    pub async fn resolve_with(
        &self,
        query: &str,
        limit: usize,
        options: &ResolveOptions,
    ) -> Result<SearchOutcome, ResolveError> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::empty(query));
        }

        let key = (normalize_query(query), limit);
        let cell = self
            .in_flight()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let outcome = cell
            .get_or_init(|| self.run_chain(query.trim(), limit, options))
            .await
            .clone();

        let mut in_flight = self.in_flight();
        if in_flight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            in_flight.remove(&key);
        }

        outcome
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<(String, usize), SharedResolution>> {
        // The map holds no invariant a panicking holder could break.
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_chain(
        &self,
        query: &str,
        limit: usize,
        options: &ResolveOptions,
    ) -> Result<SearchOutcome, ResolveError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        if options.cache_enabled && (options.cache_first || options.offline) {
            // No lazy delete here: an expired entry is still the last resort.
            if let Some(entry) = self.cache.get_stale(query, limit).await {
                if !entry.is_expired_at(Utc::now()) && !entry.results.is_empty() {
                    debug!(query, "served from cache before any network attempt");
                    let results = entry.results.into_iter().take(limit).collect();
                    return Ok(self
                        .finish(query, results, DataSourceTag::Cache, true, attempts, started)
                        .await);
                }
            }
        }

        let chain = [
            (Tier::Primary, self.primary.as_ref(), true),
            (Tier::Secondary, self.secondary.as_ref(), options.secondary_enabled),
            (Tier::Fallback, self.fallback.as_ref(), options.fallback_enabled),
        ];

        for (tier, source, enabled) in chain {
            let Some(source) = source else { continue };
            if !enabled {
                debug!(source = source.name(), "source disabled");
                continue;
            }
            if !source.is_available() {
                debug!(source = source.name(), "source unavailable, skipping");
                continue;
            }

            attempts += 1;
            match self.attempt(tier, source.as_ref(), query, limit, options).await {
                Ok(mut results) => {
                    results.truncate(limit);
                    if options.cache_enabled {
                        self.cache.set(query, &results, source.tag(), limit).await;
                    }
                    return Ok(self
                        .finish(query, results, source.tag(), false, attempts, started)
                        .await);
                }
                Err(e) => {
                    warn!(source = source.name(), query, error = %e, "source did not satisfy query");
                }
            }
        }

        if options.fallback_enabled && options.cache_enabled {
            if let Some(entry) = self.cache.get_stale(query, limit).await {
                if !entry.results.is_empty() {
                    info!(query, "all live sources failed, serving stale cache entry");
                    let results = entry.results.into_iter().take(limit).collect();
                    return Ok(self
                        .finish(query, results, DataSourceTag::Cache, true, attempts, started)
                        .await);
                }
            }
        }

        let elapsed = elapsed_ms(started);
        self.history
            .append(query, 0, DataSourceTag::Error, elapsed)
            .await;
        warn!(query, attempts, elapsed_ms = elapsed, "all data sources failed");
        Err(ResolveError::Exhausted { attempts })
    }

    async fn attempt(
        &self,
        tier: Tier,
        source: &dyn SearchSource,
        query: &str,
        limit: usize,
        options: &ResolveOptions,
    ) -> Result<Vec<ResultItem>, SourceError> {
        let results = if tier == Tier::Primary {
            tokio::time::timeout(options.primary_timeout, source.search(query, limit))
                .await
                .map_err(|_| SourceError::Timeout(options.primary_timeout))??
        } else {
            source.search(query, limit).await?
        };

        if results.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(results)
    }

    async fn finish(
        &self,
        query: &str,
        results: Vec<ResultItem>,
        data_source: DataSourceTag,
        cache_hit: bool,
        attempts: u32,
        started: Instant,
    ) -> SearchOutcome {
        let response_time_ms = elapsed_ms(started);
        self.history
            .append(query, results.len(), data_source, response_time_ms)
            .await;

        info!(
            query,
            source = %data_source,
            count = results.len(),
            attempts,
            elapsed_ms = response_time_ms,
            "search resolved"
        );

        SearchOutcome {
            query: query.to_string(),
            results,
            data_source,
            performance: PerformanceInfo {
                response_time_ms,
                cache_hit,
                attempts,
                data_source,
            },
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
