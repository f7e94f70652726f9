//! Core data models used throughout the resolver.
//!
//! These types represent the normalized search hits, the provenance tags
//! attached to every result set, and the cache and history records that a
//! resolution leaves behind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize a query for cache keys and de-duplication.
///
/// The verbatim (trimmed) query is still what goes to remote sources.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// A normalized search hit, independent of the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Never empty; synthesized as `result-<index>` when the provider omits it.
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub date: Option<String>,
    /// Free-form type tag such as `"mevzuat"` or `"yargi"`.
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub relevance: f64,
}

/// Provenance label of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceTag {
    Primary,
    Secondary,
    Fallback,
    Cache,
    Error,
}

impl DataSourceTag {
    pub const ALL: [DataSourceTag; 5] = [
        DataSourceTag::Primary,
        DataSourceTag::Secondary,
        DataSourceTag::Fallback,
        DataSourceTag::Cache,
        DataSourceTag::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceTag::Primary => "primary",
            DataSourceTag::Secondary => "secondary",
            DataSourceTag::Fallback => "fallback",
            DataSourceTag::Cache => "cache",
            DataSourceTag::Error => "error",
        }
    }
}

impl fmt::Display for DataSourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSourceTag::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown data source tag: {}", s))
    }
}

/// A cached result set keyed by `(normalized query, result_limit)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub result_limit: usize,
    pub results: Vec<ResultItem>,
    pub data_source: DataSourceTag,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// One completed search attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub result_count: usize,
    pub data_source: DataSourceTag,
    pub response_time_ms: u64,
}

/// Aggregates over the History Store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    /// Every tag is present, zero-filled.
    pub by_source: BTreeMap<DataSourceTag, usize>,
    pub average_response_time_ms: f64,
    pub average_result_count: f64,
}

/// Timing and provenance details of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceInfo {
    pub response_time_ms: u64,
    pub cache_hit: bool,
    /// Number of adapters invoked during the resolution.
    pub attempts: u32,
    pub data_source: DataSourceTag,
}

/// Final answer of the resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<ResultItem>,
    pub data_source: DataSourceTag,
    pub performance: PerformanceInfo,
}

impl SearchOutcome {
    /// Outcome for an empty query: nothing attempted, nothing recorded.
    ///
    /// No source produced it. The `primary` tag is nominal; callers tell this
    /// outcome apart by `performance.attempts == 0` with no cache hit.
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            data_source: DataSourceTag::Primary,
            performance: PerformanceInfo {
                response_time_ms: 0,
                cache_hit: false,
                attempts: 0,
                data_source: DataSourceTag::Primary,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Tazminat Davası "), "tazminat davası");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn test_tag_round_trips_through_str() {
        for tag in DataSourceTag::ALL {
            assert_eq!(tag.as_str().parse::<DataSourceTag>().unwrap(), tag);
        }
        assert!("github".parse::<DataSourceTag>().is_err());
    }

    #[test]
    fn test_tag_serializes_lowercase() {
        let json = serde_json::to_string(&DataSourceTag::Fallback).unwrap();
        assert_eq!(json, "\"fallback\"");
    }

    #[test]
    fn test_result_item_type_field_name() {
        let item = ResultItem {
            id: "1".into(),
            title: "Türk Borçlar Kanunu".into(),
            content: String::new(),
            date: None,
            item_type: "mevzuat".into(),
            url: None,
            relevance: 0.0,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "mevzuat");
    }

    #[test]
    fn test_empty_outcome_attempted_nothing() {
        let outcome = SearchOutcome::empty("  ");
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.performance.attempts, 0);
        assert!(!outcome.performance.cache_hit);
        assert_eq!(outcome.performance.response_time_ms, 0);
        assert_eq!(outcome.data_source, outcome.performance.data_source);
    }
}
