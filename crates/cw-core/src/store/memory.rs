//! In-memory snapshot store.

use super::{next_snapshot, SnapshotStore, StoreResult};
use crate::entity::CrewMember;
use crate::view::{Freshness, ReconciledView, Snapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Copy-on-publish in-memory store.
///
/// The slot holds an `Arc<Snapshot>`; publishing swaps the `Arc` under a
/// short write lock, and readers clone the `Arc` and drop the lock
/// immediately, so reads never block writes for longer than the pointer
/// swap.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: RwLock<Option<Arc<Snapshot>>>,
}

impl MemorySnapshotStore {
    /// Creates an empty (never populated) store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn publish(&self, view: ReconciledView, freshness: Freshness) -> StoreResult<()> {
        let mut slot = self.slot.write().await;
        let snapshot = next_snapshot(slot.as_deref(), view, freshness)?;
        *slot = Some(Arc::new(snapshot));
        Ok(())
    }

    async fn current(&self) -> StoreResult<Option<Arc<Snapshot>>> {
        Ok(self.slot.read().await.clone())
    }

    async fn member(&self, key: &str) -> StoreResult<Option<CrewMember>> {
        let slot = self.slot.read().await;
        Ok(slot
            .as_ref()
            .and_then(|s| s.view.member(key))
            .cloned())
    }

    async fn mark_fallback(&self, next_refresh_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut slot = self.slot.write().await;
        let Some(current) = slot.as_deref() else {
            return Ok(false);
        };
        let mut snapshot = current.clone();
        snapshot.freshness.cached_fallback = true;
        snapshot.freshness.next_refresh_at = next_refresh_at;
        *slot = Some(Arc::new(snapshot));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{freshness_for, view_at};
    use super::*;
    use crate::store::StoreError;

    #[tokio::test]
    async fn test_never_populated_is_explicit() {
        let store = MemorySnapshotStore::new();
        assert!(store.current().await.unwrap().is_none());
        assert!(store.member("anyone").await.unwrap().is_none());
        assert!(!store.mark_fallback(Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_and_read() {
        let store = MemorySnapshotStore::new();
        let view = view_at(Utc::now());
        let freshness = freshness_for(&view);

        store.publish(view.clone(), freshness).await.unwrap();

        let snapshot = store.current().await.unwrap().unwrap();
        assert_eq!(snapshot.view.generated_at, view.generated_at);
        assert!(!snapshot.freshness.cached_fallback);
    }

    #[tokio::test]
    async fn test_out_of_order_publish_rejected() {
        let store = MemorySnapshotStore::new();
        let now = Utc::now();

        let newer = view_at(now);
        store
            .publish(newer.clone(), freshness_for(&newer))
            .await
            .unwrap();

        // A cycle that started earlier but finished late must not clobber
        // the newer view.
        let older = view_at(now - chrono::Duration::seconds(30));
        let result = store.publish(older.clone(), freshness_for(&older)).await;
        assert!(matches!(result, Err(StoreError::StaleWrite { .. })));

        let current = store.current().await.unwrap().unwrap();
        assert_eq!(current.view.generated_at, now);
    }

    #[tokio::test]
    async fn test_mark_fallback_updates_freshness_only() {
        let store = MemorySnapshotStore::new();
        let view = view_at(Utc::now());
        store
            .publish(view.clone(), freshness_for(&view))
            .await
            .unwrap();

        let retry_at = Utc::now() + chrono::Duration::minutes(10);
        assert!(store.mark_fallback(retry_at).await.unwrap());

        let snapshot = store.current().await.unwrap().unwrap();
        assert!(snapshot.freshness.cached_fallback);
        assert_eq!(snapshot.freshness.next_refresh_at, retry_at);
        // The view itself is unchanged.
        assert_eq!(snapshot.view.generated_at, view.generated_at);
    }
}
