//! Snapshot store: the single mutable slot holding the current view.
//!
//! The store follows a single-writer, multiple-reader discipline: the
//! refresh scheduler is the only writer, and readers get `Arc` clones of
//! an immutable snapshot (copy-on-publish), so no read ever blocks a
//! write.

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

use crate::entity::CrewMember;
use crate::view::{Freshness, ReconciledView, Snapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// An incoming view's generation timestamp does not advance past the
    /// current one. The write is rejected so a slow cycle can never clobber
    /// a newer view.
    #[error("stale write rejected: incoming {incoming} does not advance past current {current}")]
    StaleWrite {
        incoming: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Underlying I/O failed (file backend only).
    #[error("store I/O error: {0}")]
    Io(String),

    /// Snapshot (de)serialization failed.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable, queryable holder of the last reconciled view.
///
/// `current()` returning `None` is the explicit "never populated" state,
/// observably different from a view with zero members.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Atomically publishes a new view with its freshness record.
    ///
    /// Rejects out-of-order writes with [`StoreError::StaleWrite`] by
    /// comparing generation timestamps.
    async fn publish(&self, view: ReconciledView, freshness: Freshness) -> StoreResult<()>;

    /// Returns the current snapshot, or `None` if no refresh has ever
    /// completed.
    async fn current(&self) -> StoreResult<Option<Arc<Snapshot>>>;

    /// Looks up a member in the current view by identity key.
    async fn member(&self, key: &str) -> StoreResult<Option<CrewMember>>;

    /// Marks the current snapshot as a cached fallback after a failed
    /// cycle, updating only the freshness record. Returns `false` when the
    /// store was never populated (nothing to mark).
    async fn mark_fallback(&self, next_refresh_at: DateTime<Utc>) -> StoreResult<bool>;
}

/// Shared write-path logic: validates ordering and produces the new
/// snapshot value.
pub(crate) fn next_snapshot(
    current: Option<&Snapshot>,
    view: ReconciledView,
    freshness: Freshness,
) -> StoreResult<Snapshot> {
    if let Some(existing) = current {
        if view.generated_at <= existing.view.generated_at {
            return Err(StoreError::StaleWrite {
                incoming: view.generated_at,
                current: existing.view.generated_at,
            });
        }
    }
    Ok(Snapshot { view, freshness })
}
