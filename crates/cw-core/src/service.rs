//! The crew service facade.
//!
//! The only entry point collaborators use: read the cached snapshot,
//! look up a member, or request a refresh. Holds no reconciliation logic
//! of its own.

use crate::entity::CrewMember;
use crate::scheduler::{RefreshOutcome, RefreshScheduler};
use crate::store::{SnapshotStore, StoreResult};
use crate::view::Snapshot;
use std::sync::Arc;

/// Read/trigger facade over the snapshot store and scheduler.
#[derive(Clone)]
pub struct CrewService {
    store: Arc<dyn SnapshotStore>,
    scheduler: Arc<RefreshScheduler>,
}

impl CrewService {
    /// Creates the facade.
    pub fn new(store: Arc<dyn SnapshotStore>, scheduler: Arc<RefreshScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// The current reconciled view plus freshness metadata.
    ///
    /// `None` means no refresh has ever completed, which is observably
    /// different from a view with zero members.
    pub async fn current_roster(&self) -> StoreResult<Option<Arc<Snapshot>>> {
        self.store.current().await
    }

    /// Detail for a single member by identity key.
    pub async fn member_detail(&self, key: &str) -> StoreResult<Option<CrewMember>> {
        self.store.member(key).await
    }

    /// Requests a refresh, coalescing with any in-flight cycle.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        self.scheduler.request_refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Reconciler, ReconcilerConfig};
    use crate::scheduler::SchedulerConfig;
    use crate::store::MemorySnapshotStore;

    fn service() -> (CrewService, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            SchedulerConfig::default(),
            Vec::new(),
            Reconciler::new(ReconcilerConfig::default()),
            store.clone(),
        ));
        (CrewService::new(store.clone(), scheduler), store)
    }

    #[tokio::test]
    async fn test_reads_pass_through_never_populated() {
        let (service, _store) = service();
        assert!(service.current_roster().await.unwrap().is_none());
        assert!(service.member_detail("jane doe").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_running_loop_is_scheduled() {
        let (service, _store) = service();
        assert_eq!(service.request_refresh().await, RefreshOutcome::Scheduled);
    }
}
