//! # cw-core
//!
//! Core of crew-watch: data model, cross-source reconciliation, snapshot
//! store, refresh scheduler, and the service facade collaborators consume.
//!
//! Provider implementations live in `cw-providers`; this crate only sees
//! them through the [`source::RosterSource`] trait.

pub mod aggregator;
pub mod entity;
pub mod mission;
pub mod reconcile;
pub mod report;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;
pub mod view;

pub use aggregator::{collect, AggregatorConfig, CollectOutcome};
pub use entity::{
    Agreement, AttributeObservation, AttributeState, CrewMember, CrewStatus, ATTR_AFFILIATION,
    ATTR_LOCATION, ATTR_NAME, ATTR_STATUS,
};
pub use mission::{Mission, MissionContext, MissionState};
pub use reconcile::{
    ExternalIdMatcher, IdentityMatcher, NormalizedNameMatcher, Reconciler, ReconcilerConfig,
};
pub use report::{FetchFailure, FetchOutcome, RawCrewRecord, SourceReport};
pub use scheduler::{
    CyclePhase, CycleOutcome, RefreshOutcome, RefreshScheduler, SchedulerConfig, SchedulerStats,
};
pub use service::CrewService;
pub use source::{RosterSource, SourceError, SourceResult};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StoreError, StoreResult};
pub use view::{Freshness, ReconciledView, RosterTransition, Snapshot, ValidationStatus};
