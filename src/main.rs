//! # Hybrid Legal Search CLI (`hls`)
//!
//! ## Usage
//!
//! ```bash
//! hls --config ./config/hls.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hls init` | Create the SQLite database and run schema migrations |
//! | `hls sources` | Show the degradation chain and each source's state |
//! | `hls search "<query>"` | Resolve a query through the chain |
//! | `hls history list\|stats\|remove\|clear` | Inspect or edit search history |
//! | `hls cache list\|stats\|clear` | Inspect or clear the result cache |
//! | `hls dataset refresh\|status` | Manage the community dataset |
//!
//! ## Examples
//!
//! ```bash
//! # Serve from cache when possible, otherwise walk the chain
//! hls search "iş kanunu" --cache-first --config ./config/hls.toml
//!
//! # Give the primary API 2 seconds, skip the static fallback
//! hls search "tazminat" --timeout-ms 2000 --no-fallback
//!
//! # Machine-readable output
//! hls search "kira" --limit 5 --json
//! ```
//!
//! Logs go to stderr. Set `RUST_LOG=hybrid_legal_search=debug` for the
//! per-source trace of a resolution.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hybrid_legal_search::config::{self, Config};
use hybrid_legal_search::db::MEMORY_PATH;
use hybrid_legal_search::search::{self, SearchFlags};
use hybrid_legal_search::{migrate, sources_cmd, stats};

/// Multi-source search over Turkish legislation and court decisions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/hls.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "hls",
    about = "Hybrid Legal Search: multi-source search over Turkish legal documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/hls.toml`.
    #[arg(long, global = true, default_value = "./config/hls.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Show the degradation chain and the state of each source.
    Sources,

    /// Resolve a query through the degradation chain.
    Search {
        /// Free-text query. Matching is case-insensitive.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Serve a live cache entry before contacting any source.
        #[arg(long)]
        cache_first: bool,

        /// Treat the network as unavailable; prefers the cache like --cache-first.
        #[arg(long)]
        offline: bool,

        /// Neither read nor write the cache.
        #[arg(long)]
        no_cache: bool,

        /// Skip the community dataset.
        #[arg(long)]
        no_secondary: bool,

        /// Skip the static fallback and the stale-cache last resort.
        #[arg(long)]
        no_fallback: bool,

        /// Primary source deadline in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or edit the search history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Inspect or clear the result cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the community dataset used by the secondary source.
    Dataset {
        #[command(subcommand)]
        action: DatasetAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recent searches, newest first.
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Aggregate counts and averages per data source.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Remove one entry by id.
    Remove { id: String },
    /// Remove every entry.
    Clear,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List live cache entries, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Stored and live entry counts.
    Stats,
    /// Remove every cache entry.
    Clear,
}

#[derive(Subcommand)]
enum DatasetAction {
    /// Fetch every configured dataset and replace the local snapshot.
    Refresh,
    /// Show the snapshot state.
    Status,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hybrid_legal_search=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // An empty query needs neither config nor storage.
    if let Commands::Search { query, json, .. } = &cli.command {
        if query.trim().is_empty() {
            let flags = SearchFlags {
                json: *json,
                ..SearchFlags::default()
            };
            search::run_search(&Config::minimal(), query, &flags).await?;
            return Ok(());
        }
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            if cfg.db.path.as_os_str() == MEMORY_PATH {
                println!("In-memory database configured; nothing to initialize.");
            } else {
                migrate::run_migrations(&cfg).await?;
                println!("Database initialized successfully.");
            }
        }
        Commands::Sources => {
            sources_cmd::list_sources(&cfg).await?;
        }
        Commands::Search {
            query,
            limit,
            cache_first,
            offline,
            no_cache,
            no_secondary,
            no_fallback,
            timeout_ms,
            json,
        } => {
            let flags = SearchFlags {
                limit,
                cache_first,
                offline,
                no_cache,
                no_secondary,
                no_fallback,
                timeout_ms,
                json,
            };
            search::run_search(&cfg, &query, &flags).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::List { limit, json } => {
                stats::run_history_list(&cfg, limit, json).await?;
            }
            HistoryAction::Stats { json } => {
                stats::run_history_stats(&cfg, json).await?;
            }
            HistoryAction::Remove { id } => {
                stats::run_history_remove(&cfg, &id).await?;
            }
            HistoryAction::Clear => {
                stats::run_history_clear(&cfg).await?;
            }
        },
        Commands::Cache { action } => match action {
            CacheAction::List { json } => {
                stats::run_cache_list(&cfg, json).await?;
            }
            CacheAction::Stats => {
                stats::run_cache_stats(&cfg).await?;
            }
            CacheAction::Clear => {
                stats::run_cache_clear(&cfg).await?;
            }
        },
        Commands::Dataset { action } => match action {
            DatasetAction::Refresh => {
                sources_cmd::refresh_dataset(&cfg).await?;
            }
            DatasetAction::Status => {
                sources_cmd::dataset_status(&cfg).await?;
            }
        },
    }

    Ok(())
}
