//! `hls search`: resolve one query and print the outcome.

use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::context::SearchContext;
use crate::models::SearchOutcome;
use crate::resolver::ResolveOptions;

/// Per-invocation overrides of the configured [`ResolveOptions`].
#[derive(Debug, Default, Clone)]
pub struct SearchFlags {
    pub limit: usize,
    pub cache_first: bool,
    pub offline: bool,
    pub no_cache: bool,
    pub no_secondary: bool,
    pub no_fallback: bool,
    pub timeout_ms: Option<u64>,
    pub json: bool,
}

impl SearchFlags {
    pub fn apply(&self, mut options: ResolveOptions) -> ResolveOptions {
        options.cache_first |= self.cache_first;
        options.offline |= self.offline;
        if self.no_cache {
            options.cache_enabled = false;
        }
        if self.no_secondary {
            options.secondary_enabled = false;
        }
        if self.no_fallback {
            options.fallback_enabled = false;
        }
        if let Some(ms) = self.timeout_ms {
            options.primary_timeout = Duration::from_millis(ms);
        }
        options
    }
}

/// Upper bound on waiting for remote history uploads before exit.
const SYNC_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run_search(config: &Config, query: &str, flags: &SearchFlags) -> Result<()> {
    if query.trim().is_empty() {
        if flags.json {
            println!("{}", serde_json::to_string_pretty(&SearchOutcome::empty(query))?);
        } else {
            println!("No results.");
        }
        return Ok(());
    }

    let ctx = SearchContext::from_config(config).await?;
    let options = flags.apply(ctx.resolver.options().clone());
    let resolved = ctx.resolver.resolve_with(query, flags.limit, &options).await;
    // Error entries are synced too, so flush before propagating.
    ctx.history.flush_sync(SYNC_FLUSH_TIMEOUT).await;
    let outcome = resolved?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome) {
    let perf = &outcome.performance;
    println!(
        "source: {}  results: {}  time: {} ms  attempts: {}{}",
        outcome.data_source,
        outcome.results.len(),
        perf.response_time_ms,
        perf.attempts,
        if perf.cache_hit { "  (cache hit)" } else { "" }
    );
    println!();

    if outcome.results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, item) in outcome.results.iter().enumerate() {
        println!("{}. [{:.2}] {} / {}", i + 1, item.relevance, item.item_type, item.title);
        if let Some(ref date) = item.date {
            println!("    date: {}", date);
        }
        if let Some(ref url) = item.url {
            if !url.is_empty() {
                println!("    url: {}", url);
            }
        }
        if !item.content.is_empty() {
            println!("    excerpt: \"{}\"", excerpt(&item.content, 240));
        }
        println!("    id: {}", item.id);
        println!();
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flags_override_options() {
        let flags = SearchFlags {
            limit: 10,
            cache_first: true,
            no_fallback: true,
            timeout_ms: Some(250),
            ..Default::default()
        };
        let options = flags.apply(ResolveOptions::default());
        assert!(options.cache_first);
        assert!(options.cache_enabled);
        assert!(!options.fallback_enabled);
        assert!(options.secondary_enabled);
        assert_eq!(options.primary_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let text = "ğüşıöç".repeat(100);
        let cut = excerpt(&text, 10);
        assert_eq!(cut.chars().count(), 13);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("kısa\nmetin", 240), "kısa metin");
    }
}
