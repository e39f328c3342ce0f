//! File-backed snapshot store.
//!
//! Persists the current snapshot as a single JSON document so the last
//! good view survives process restarts and crashes between refresh
//! cycles. Writes go to a sibling temp file followed by an atomic rename,
//! so a reader (or a crash) never observes a half-written snapshot.

use super::{next_snapshot, SnapshotStore, StoreError, StoreResult};
use crate::entity::CrewMember;
use crate::view::{Freshness, ReconciledView, Snapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Durable snapshot store backed by a JSON file.
///
/// The in-memory slot is the source of truth for reads; the file exists
/// for durability and is rewritten on every publish.
pub struct FileSnapshotStore {
    path: PathBuf,
    slot: RwLock<Option<Arc<Snapshot>>>,
}

impl FileSnapshotStore {
    /// Opens the store, loading the last persisted snapshot if one exists.
    ///
    /// A corrupt snapshot file is logged and ignored rather than treated
    /// as fatal: the store simply starts in the never-populated state.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let slot = match load_snapshot(&path).await {
            Ok(Some(snapshot)) => {
                info!(
                    path = %path.display(),
                    generated_at = %snapshot.view.generated_at,
                    "loaded persisted snapshot"
                );
                Some(Arc::new(snapshot))
            }
            Ok(None) => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable snapshot file");
                None
            }
        };

        Ok(Self {
            path,
            slot: RwLock::new(slot),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> StoreResult<Option<Snapshot>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let snapshot = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            Ok(Some(snapshot))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::Io(err.to_string())),
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn publish(&self, view: ReconciledView, freshness: Freshness) -> StoreResult<()> {
        let mut slot = self.slot.write().await;
        let snapshot = Arc::new(next_snapshot(slot.as_deref(), view, freshness)?);
        self.persist(&snapshot).await?;
        *slot = Some(snapshot);
        Ok(())
    }

    async fn current(&self) -> StoreResult<Option<Arc<Snapshot>>> {
        Ok(self.slot.read().await.clone())
    }

    async fn member(&self, key: &str) -> StoreResult<Option<CrewMember>> {
        let slot = self.slot.read().await;
        Ok(slot.as_ref().and_then(|s| s.view.member(key)).cloned())
    }

    async fn mark_fallback(&self, next_refresh_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut slot = self.slot.write().await;
        let Some(current) = slot.as_deref() else {
            return Ok(false);
        };
        let mut snapshot = current.clone();
        snapshot.freshness.cached_fallback = true;
        snapshot.freshness.next_refresh_at = next_refresh_at;
        let snapshot = Arc::new(snapshot);
        self.persist(&snapshot).await?;
        *slot = Some(snapshot);
        Ok(true)
    }
}
