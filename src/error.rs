// src/error.rs
//! Error taxonomy for the aggregation pipeline.
//!
//! Per-source failures (`FetchError`, `SourceError::Empty`) stay inside the
//! aggregator; only `ValidationError`, `CodecError` and `AggregateError`
//! ever reach a caller.

use thiserror::Error;

/// Malformed, missing or excess input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("URLs required")]
    NoUrls,
    #[error("Maximum {max} URLs allowed, got {count}")]
    TooManyUrls { count: usize, max: usize },
    #[error("Invalid URL format: {url} ({reason})")]
    InvalidUrl { url: String, reason: String },
    #[error("Short code required")]
    MissingCode,
}

/// One source could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("failed to fetch {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("failed to fetch {url}: timeout")]
    Timeout { url: String },
    #[error("failed to fetch {url}: body exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::Timeout { url }
            | FetchError::TooLarge { url, .. } => url,
        }
    }

    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "status",
            FetchError::Network { .. } => "network",
            FetchError::Timeout { .. } => "timeout",
            FetchError::TooLarge { .. } => "too_large",
        }
    }
}

/// Why a single source contributed no articles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no articles extracted from {url}")]
    Empty { url: String },
    #[error("source task for {url} aborted")]
    Aborted { url: String },
}

impl SourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch(e) => e.kind(),
            SourceError::Empty { .. } => "empty",
            SourceError::Aborted { .. } => "aborted",
        }
    }
}

/// Short code did not decode to at least one URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Invalid or corrupted short code: {0}")]
    Malformed(String),
    #[error("Invalid short code")]
    Empty,
}

/// Whole-request failure: every source combined produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("Could not extract any articles from provided URLs")]
    Empty { sources: usize, failures: Vec<SourceError> },
}
