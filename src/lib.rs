// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod rss;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{Aggregator, Limits};
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::ingest::types::{Article, ExtractionResult, SourceFetcher};
pub use crate::rss::AggregateFeed;
pub use crate::source::SourceRequest;
