//! History and cache inspection commands.
//!
//! Backs `hls history ...` and `hls cache ...`: listing recent searches,
//! aggregate statistics per data source, and cache maintenance.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::context::SearchContext;
use crate::models::DataSourceTag;

pub async fn run_history_list(config: &Config, limit: usize, json: bool) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    let entries = ctx.history.list(limit).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No search history.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<28} {:>7} {:>9} {:>8}   {}",
        "ID", "QUERY", "RESULTS", "SOURCE", "TIME", "WHEN"
    );
    println!("{}", "-".repeat(110));
    for e in &entries {
        println!(
            "{:<36}  {:<28} {:>7} {:>9} {:>6}ms   {}",
            e.id,
            clip(&e.query, 28),
            e.result_count,
            e.data_source,
            e.response_time_ms,
            format_relative(e.created_at)
        );
    }
    Ok(())
}

pub async fn run_history_stats(config: &Config, json: bool) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    let stats = ctx.history.stats().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Search History Stats");
    println!("====================");
    println!();
    println!("  Searches:          {} / {}", stats.total, ctx.history.max_entries());
    println!("  Avg response time: {:.0} ms", stats.average_response_time_ms);
    println!("  Avg result count:  {:.1}", stats.average_result_count);
    println!();
    println!("  By source:");
    for tag in DataSourceTag::ALL {
        let count = stats.by_source.get(&tag).copied().unwrap_or(0);
        println!("  {:<12} {:>6}  {}", tag.as_str(), count, percent(count, stats.total));
    }
    println!();
    Ok(())
}

pub async fn run_history_remove(config: &Config, id: &str) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    if ctx.history.remove(id).await {
        println!("Removed {}.", id);
    } else {
        anyhow::bail!("No history entry with id {}", id);
    }
    Ok(())
}

pub async fn run_history_clear(config: &Config) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    ctx.history.clear().await;
    println!("Search history cleared.");
    Ok(())
}

pub async fn run_cache_list(config: &Config, json: bool) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    let entries = ctx.cache.entries().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    println!(
        "{:<28} {:>5} {:>7} {:>9}   {}",
        "QUERY", "LIMIT", "RESULTS", "SOURCE", "EXPIRES"
    );
    println!("{}", "-".repeat(76));
    for e in &entries {
        println!(
            "{:<28} {:>5} {:>7} {:>9}   {}",
            clip(&e.query, 28),
            e.result_limit,
            e.results.len(),
            e.data_source,
            format_until(e.expires_at)
        );
    }
    Ok(())
}

pub async fn run_cache_stats(config: &Config) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    let stored = ctx.cache.size().await;
    let live = ctx.cache.entries().await.len();

    println!("Search Cache Stats");
    println!("==================");
    println!();
    println!("  Stored entries: {}", stored);
    println!("  Live entries:   {}", live);
    println!("  TTL:            {} min", ctx.cache.ttl().num_minutes());
    println!();
    Ok(())
}

pub async fn run_cache_clear(config: &Config) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    let removed = ctx.cache.clear().await;
    println!("Cache cleared ({} entries removed).", removed);
    Ok(())
}

fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "-".to_string();
    }
    format!("{}%", part * 100 / total)
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Format a past timestamp as a relative time string (e.g. "3 hours ago").
fn format_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return format_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_iso(ts)
    }
}

fn format_until(ts: DateTime<Utc>) -> String {
    let delta = (ts - Utc::now()).num_seconds();
    if delta <= 0 {
        "expired".to_string()
    } else if delta < 60 {
        format!("in {}s", delta)
    } else {
        format!("in {} min", delta / 60)
    }
}

fn format_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_relative() {
        let now = Utc::now();
        assert_eq!(format_relative(now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(1)), "1 min ago");
        assert_eq!(format_relative(now - Duration::hours(3)), "3 hours ago");
        assert_eq!(format_relative(now - Duration::days(2)), "2 days ago");
    }

    #[test]
    fn test_format_until() {
        let now = Utc::now();
        assert_eq!(format_until(now - Duration::minutes(1)), "expired");
        assert_eq!(format_until(now + Duration::minutes(10) + Duration::seconds(5)), "in 10 min");
    }

    #[test]
    fn test_percent_and_clip() {
        assert_eq!(percent(1, 4), "25%");
        assert_eq!(percent(0, 0), "-");
        assert_eq!(clip("tazminat", 28), "tazminat");
        assert_eq!(clip("abcdef", 4), "abc…");
    }
}
