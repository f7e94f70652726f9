//! # Hybrid Legal Search
//!
//! A multi-source search resolver for Turkish legal documents (legislation
//! and court decisions).
//!
//! A query is answered by the first source in a fixed degradation chain that
//! returns results. Successful live answers are written to a TTL cache, and
//! every completed search lands in a bounded, de-duplicated history.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────────────────┐
//! │  CLI (hls) │──▶│ Resolver                                  │
//! └────────────┘   │  cache-first? → primary → secondary →     │
//!                  │  fallback → stale cache → error           │
//!                  └───────┬───────────────┬──────────────────┘
//!                          │               │
//!                          ▼               ▼
//!                   ┌────────────┐  ┌──────────────┐
//!                   │ CacheStore │  │ HistoryStore │──▶ remote sync
//!                   └─────┬──────┘  └──────┬───────┘
//!                         └──────┬─────────┘
//!                                ▼
//!                     KvBackend (SQLite / memory)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hls init                          # create the database
//! hls dataset refresh               # fetch community datasets
//! hls search "kira sözleşmesi"      # resolve a query
//! hls history stats                 # searches per data source
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Source and resolution errors |
//! | [`storage`] | Key-value backend abstraction |
//! | [`db`] | Database connection and backend selection |
//! | [`migrate`] | Schema migrations |
//! | [`cache`] | TTL cache of result sets |
//! | [`history`] | Bounded search history |
//! | [`history_sync`] | Best-effort remote history upload |
//! | [`normalize`] | Provider response normalization |
//! | [`sources`] | Source adapters and local ranking |
//! | [`resolver`] | The degradation chain |
//! | [`context`] | Application wiring |
//! | [`search`] | `hls search` |
//! | [`stats`] | `hls history` and `hls cache` |
//! | [`sources_cmd`] | `hls sources` and `hls dataset` |

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod history;
pub mod history_sync;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod search;
pub mod sources;
pub mod sources_cmd;
pub mod stats;
pub mod storage;
