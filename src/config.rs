use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::normalize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Serve a live cache entry before any network attempt.
    #[serde(default)]
    pub first: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first: false,
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    30 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Entries older than this many days are swept. `0` keeps them forever.
    #[serde(default)]
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            retention_days: 0,
        }
    }
}

fn default_max_entries() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub primary: Option<PrimarySourceConfig>,
    #[serde(default)]
    pub community: CommunityConfig,
    pub fallback: Option<FallbackSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrimarySourceConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Request body field carrying the query text.
    #[serde(default = "default_query_field")]
    pub query_field: String,
    /// Request body field carrying the result limit.
    #[serde(default = "default_limit_field")]
    pub limit_field: String,
    /// Static fields merged into every request body.
    #[serde(default)]
    pub extra_body: toml::Table,
}

impl PrimarySourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_provider() -> String {
    "mevzuat".to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_query_field() -> String {
    "query".to_string()
}
fn default_limit_field() -> String {
    "page_size".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommunityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            datasets: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FallbackSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

/// Best-effort push of history entries to a remote REST store.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    pub url: String,
    #[serde(default = "default_sync_table")]
    pub table: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    pub user_id: String,
}

fn default_sync_table() -> String {
    "user_searches".to_string()
}
fn default_api_key_env() -> String {
    "HLS_SYNC_API_KEY".to_string()
}

impl Config {
    /// In-memory configuration with no remote sources.
    ///
    /// Used by commands that can run without a config file and by tests.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from(crate::db::MEMORY_PATH),
            },
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            sources: SourcesConfig::default(),
            sync: None,
        }
    }

    pub fn primary_timeout(&self) -> Duration {
        self.sources
            .primary
            .as_ref()
            .map(|p| p.timeout())
            .unwrap_or_else(|| Duration::from_millis(default_timeout_ms()))
    }

    pub fn fallback_enabled(&self) -> bool {
        self.sources.fallback.as_ref().is_some_and(|f| f.enabled)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    if config.history.max_entries == 0 {
        anyhow::bail!("history.max_entries must be >= 1");
    }

    if let Some(primary) = &config.sources.primary {
        if primary.url.trim().is_empty() {
            anyhow::bail!("sources.primary.url must not be empty");
        }
        if primary.timeout_ms == 0 {
            anyhow::bail!("sources.primary.timeout_ms must be > 0");
        }
        check_provider("sources.primary", &primary.provider)?;
    }

    for dataset in &config.sources.community.datasets {
        if dataset.url.trim().is_empty() {
            anyhow::bail!("sources.community dataset '{}' has an empty url", dataset.name);
        }
        check_provider(&format!("sources.community dataset '{}'", dataset.name), &dataset.provider)?;
    }

    if let Some(fallback) = &config.sources.fallback {
        if fallback.url.trim().is_empty() {
            anyhow::bail!("sources.fallback.url must not be empty");
        }
        check_provider("sources.fallback", &fallback.provider)?;
    }

    if let Some(sync) = &config.sync {
        if sync.url.trim().is_empty() || sync.user_id.trim().is_empty() {
            anyhow::bail!("sync.url and sync.user_id must both be set");
        }
    }

    Ok(())
}

fn check_provider(section: &str, provider: &str) -> Result<()> {
    if normalize::lookup(provider).is_none() {
        anyhow::bail!(
            "{}: unknown provider '{}'. Must be one of: {}",
            section,
            provider,
            normalize::provider_ids().join(", ")
        );
    }
    Ok(())
}
