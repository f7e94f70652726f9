//! Local relevance ranking for datasets searched in memory.
//!
//! Scoring is a plain substring heuristic: `+2` when the title contains the
//! query, `+1` when the content does. No normalization by query length or
//! term frequency.

use crate::models::{normalize_query, ResultItem};

const TITLE_WEIGHT: f64 = 2.0;
const CONTENT_WEIGHT: f64 = 1.0;

/// Score `item` against an already-normalized needle.
pub fn score(item: &ResultItem, needle: &str) -> f64 {
    let mut score = 0.0;
    if item.title.to_lowercase().contains(needle) {
        score += TITLE_WEIGHT;
    }
    if item.content.to_lowercase().contains(needle) {
        score += CONTENT_WEIGHT;
    }
    score
}

/// Matching items of `items`, best first, at most `limit`.
///
/// The computed score replaces `relevance`. Ties keep dataset order.
pub fn rank(items: &[ResultItem], query: &str, limit: usize) -> Vec<ResultItem> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<ResultItem> = items
        .iter()
        .filter_map(|item| {
            let s = score(item, &needle);
            (s > 0.0).then(|| ResultItem {
                relevance: s,
                ..item.clone()
            })
        })
        .collect();

    // sort_by is stable, so equal scores stay in dataset order
    matches.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(limit);
    matches
}
