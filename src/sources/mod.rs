//! Source adapters of the degradation chain.
//!
//! Each adapter turns a query and a result limit into normalized
//! [`ResultItem`]s or a [`SourceError`]. Adapters never write to the Cache or
//! History stores; that is the resolver's job.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │  primary     │──▶│  community data  │──▶│  static fallback │
//! │  HTTP POST   │   │  in-memory       │   │  GET once + rank │
//! └──────────────┘   └──────────────────┘   └──────────────────┘
//! ```
//!
//! | Adapter | Tag | Network |
//! |---------|-----|---------|
//! | [`HttpPrimarySource`] | `primary` | one request per query |
//! | [`CommunitySource`] | `secondary` | none per query (dataset pre-fetched) |
//! | [`StaticFallbackSource`] | `fallback` | one request per process |

pub mod community;
pub mod fallback;
pub mod primary;
pub mod ranking;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::{DataSourceTag, ResultItem};

pub use community::{CommunityDataset, CommunitySource, DatasetStatus};
pub use fallback::StaticFallbackSource;
pub use primary::HttpPrimarySource;

/// One data source of the degradation chain.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use hybrid_legal_search::error::SourceError;
/// use hybrid_legal_search::models::{DataSourceTag, ResultItem};
/// use hybrid_legal_search::sources::SearchSource;
///
/// struct Offline;
///
/// #[async_trait]
/// impl SearchSource for Offline {
///     fn name(&self) -> &str { "offline" }
///     fn tag(&self) -> DataSourceTag { DataSourceTag::Primary }
///
///     async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<ResultItem>, SourceError> {
///         Err(SourceError::Unavailable("offline".into()))
///     }
/// }
/// ```
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Short name used in logs (e.g. `"mevzuat-api"`).
    fn name(&self) -> &str;

    /// Tag attached to result sets this source produces.
    fn tag(&self) -> DataSourceTag;

    /// Whether the source can be attempted right now.
    ///
    /// The resolver skips unavailable sources without counting an attempt.
    fn is_available(&self) -> bool {
        true
    }

    /// Search for `query`, returning at most `limit` items.
    ///
    /// Dropping the returned future must cancel any in-flight request.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, SourceError>;
}
