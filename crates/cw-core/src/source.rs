//! The roster source capability.
//!
//! Every data provider is modeled as one implementation of [`RosterSource`]:
//! "can produce zero-or-more raw crew records for the current moment".
//! Implementations live in the `cw-providers` crate; the aggregator only
//! sees the trait.

use crate::report::RawCrewRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors a roster source can produce.
///
/// These never escape past the aggregation boundary: the aggregator turns
/// them into failed `SourceReport`s, so downstream components see failure
/// as data, not as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// A single provider of current crew state.
///
/// Implementations must be stateless beyond the lifetime of one fetch call
/// and must not share mutable state; the caller enforces the fetch timeout
/// via cancellation rather than trusting the implementation's own client.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Stable provider id, used in configuration, provenance, and logs.
    fn id(&self) -> &str;

    /// Fetches the provider's view of who is currently active.
    async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>>;
}
