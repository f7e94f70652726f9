//! Error types for source adapters and the resolver.
//!
//! [`SourceError`] describes why a single adapter did not satisfy a query.
//! It never reaches the caller: the resolver logs it and moves on to the
//! next source. Only [`ResolveError`] propagates out of a resolution.

use std::time::Duration;

use thiserror::Error;

/// A single adapter failed to produce results.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request did not complete within the allotted time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP error {status}")]
    Http { status: u16 },

    /// Connection, DNS or body transfer failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The source is disabled, not loaded, or marked inactive.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source answered but had nothing for the query.
    #[error("no results")]
    Empty,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return SourceError::Network(format!("request timed out: {}", err));
        }
        if let Some(status) = err.status() {
            return SourceError::Http {
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return SourceError::Malformed(err.to_string());
        }
        SourceError::Network(err.to_string())
    }
}

/// Terminal failure of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Every source in the degradation chain failed, stale cache included.
    #[error("all data sources failed ({attempts} attempts)")]
    Exhausted { attempts: u32 },
}
