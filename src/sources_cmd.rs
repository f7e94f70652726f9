//! `hls sources` and `hls dataset ...`: source health and dataset refresh.

use anyhow::Result;

use crate::config::Config;
use crate::context::SearchContext;
use crate::sources::DatasetStatus;

pub async fn list_sources(config: &Config) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;

    let primary = match &config.sources.primary {
        Some(p) => format!("{} ({}, {} ms)", p.url, p.provider, p.timeout_ms),
        None => "NOT CONFIGURED".to_string(),
    };
    let community = if !config.sources.community.enabled {
        "DISABLED".to_string()
    } else {
        format!(
            "{} dataset(s), {} items, {}",
            config.sources.community.datasets.len(),
            ctx.dataset.len(),
            status_label(ctx.dataset.status())
        )
    };
    let fallback = match &config.sources.fallback {
        Some(f) if f.enabled => format!("{} ({})", f.url, f.provider),
        Some(_) => "DISABLED".to_string(),
        None => "NOT CONFIGURED".to_string(),
    };
    let cache = if config.cache.enabled {
        format!(
            "{} entries, ttl {} min{}",
            ctx.cache.size().await,
            config.cache.ttl_secs / 60,
            if config.cache.first { ", cache-first" } else { "" }
        )
    } else {
        "DISABLED".to_string()
    };

    println!("{:<6} {:<12} DETAILS", "ORDER", "SOURCE");
    println!("{:<6} {:<12} {}", "1", "primary", primary);
    println!("{:<6} {:<12} {}", "2", "secondary", community);
    println!("{:<6} {:<12} {}", "3", "fallback", fallback);
    println!("{:<6} {:<12} {}", "4", "cache", cache);

    Ok(())
}

pub async fn refresh_dataset(config: &Config) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    if config.sources.community.datasets.is_empty() {
        println!("No community datasets configured.");
        return Ok(());
    }

    let report = ctx.dataset.refresh().await;
    for (name, count) in &report.loaded {
        println!("  {:<20} {} items", name, count);
    }
    for (name, error) in &report.failed {
        println!("  {:<20} FAILED: {}", name, error);
    }
    println!("status: {}  total: {} items", status_label(report.status), ctx.dataset.len());

    if report.loaded.is_empty() {
        anyhow::bail!("no community dataset could be fetched");
    }
    Ok(())
}

pub async fn dataset_status(config: &Config) -> Result<()> {
    let ctx = SearchContext::from_config(config).await?;
    let updated = ctx
        .dataset
        .updated_at()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!("status:  {}", status_label(ctx.dataset.status()));
    println!("items:   {}", ctx.dataset.len());
    println!("updated: {}", updated);
    Ok(())
}

fn status_label(status: DatasetStatus) -> &'static str {
    match status {
        DatasetStatus::Active => "active",
        DatasetStatus::Loading => "loading",
        DatasetStatus::Error => "error",
    }
}
