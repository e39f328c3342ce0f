//! Refresh scheduler: drives aggregate → reconcile → publish cycles.
//!
//! One cycle runs at a time (Idle → Fetching → Reconciling → Published →
//! Idle). The steady interval is shortened when the previous cycle saw a
//! roster transition or a conflicted view, and repeated total failures
//! back off exponentially up to a ceiling while the store keeps serving
//! the cached snapshot.

use crate::aggregator::{self, AggregatorConfig};
use crate::reconcile::Reconciler;
use crate::store::{SnapshotStore, StoreError};
use crate::view::{Freshness, ValidationStatus};
use crate::source::RosterSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tracing::{debug, info, warn};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Steady-state interval between refresh cycles.
    pub steady_interval: Duration,
    /// Shortened interval used after a cycle that detected a transition or
    /// a conflicted view, to confirm the change quickly.
    pub accelerated_interval: Duration,
    /// First backoff step after a totally failed cycle.
    pub backoff_floor: Duration,
    /// Backoff never exceeds this.
    pub backoff_ceiling: Duration,
    /// Fan-out settings for the aggregation phase.
    pub aggregator: AggregatorConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            steady_interval: Duration::from_secs(6 * 60 * 60),
            accelerated_interval: Duration::from_secs(2 * 60 * 60),
            backoff_floor: Duration::from_secs(5 * 60),
            backoff_ceiling: Duration::from_secs(60 * 60),
            aggregator: AggregatorConfig::default(),
        }
    }
}

/// Where the scheduler currently is in its cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Fetching,
    Reconciling,
    Published,
}

/// How a manual refresh request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The scheduler was idle; a cycle starts now.
    Immediate,
    /// A cycle was already in flight; the request joins it.
    Joined,
    /// No scheduler loop is running; the next scheduled cycle will serve
    /// the request.
    Scheduled,
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new view was reconciled and offered to the store.
    Published,
    /// Every source failed; the cached view was marked as fallback.
    Fallback,
    /// Another cycle was already in flight.
    Skipped,
}

/// Counters for observing scheduler behavior.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Cycles that ran to completion (published or fallback).
    pub cycles_run: u64,
    /// Views accepted by the store.
    pub views_published: u64,
    /// Cycles in which every source failed.
    pub failed_cycles: u64,
    /// Publishes rejected because a newer view already existed.
    pub stale_writes: u64,
    /// When the last cycle finished.
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Drives the refresh loop. The scheduler is the store's sole writer.
pub struct RefreshScheduler {
    config: SchedulerConfig,
    sources: Vec<Arc<dyn RosterSource>>,
    reconciler: Reconciler,
    store: Arc<dyn SnapshotStore>,
    phase: RwLock<CyclePhase>,
    refresh: Notify,
    running: AtomicBool,
    consecutive_failures: AtomicU32,
    accelerate_next: AtomicBool,
    stats: RwLock<SchedulerStats>,
    shutdown: watch::Sender<bool>,
}

impl RefreshScheduler {
    /// Creates a scheduler over the given sources and store.
    pub fn new(
        config: SchedulerConfig,
        sources: Vec<Arc<dyn RosterSource>>,
        reconciler: Reconciler,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            sources,
            reconciler,
            store,
            phase: RwLock::new(CyclePhase::Idle),
            refresh: Notify::new(),
            running: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            accelerate_next: AtomicBool::new(false),
            stats: RwLock::new(SchedulerStats::default()),
            shutdown,
        }
    }

    /// Runs the refresh loop until [`stop`](Self::stop) is called.
    ///
    /// A cycle runs immediately at startup, then on every interval tick or
    /// manual refresh. The manual-refresh signal only interrupts the idle
    /// wait; in-flight fetches always run to their own timeout.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        let mut shutdown_rx = self.shutdown.subscribe();
        info!(
            sources = self.sources.len(),
            steady = ?self.config.steady_interval,
            accelerated = ?self.config.accelerated_interval,
            "refresh scheduler started"
        );

        self.run_cycle().await;

        loop {
            let wait = self.next_wait();
            debug!(?wait, "scheduler idle");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.refresh.notified() => {
                    debug!("idle wait interrupted by manual refresh");
                }
                _ = shutdown_rx.changed() => {}
            }
            if *shutdown_rx.borrow() {
                break;
            }
            self.run_cycle().await;
        }

        self.running.store(false, Ordering::SeqCst);
        info!("refresh scheduler stopped");
    }

    /// Signals the run loop to exit after the current cycle.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// The current cycle phase.
    pub async fn phase(&self) -> CyclePhase {
        *self.phase.read().await
    }

    /// A copy of the current counters.
    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    /// Requests a refresh outside the steady schedule.
    ///
    /// Coalesced with any in-flight cycle: it never starts a second
    /// concurrent cycle.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        if *self.phase.read().await != CyclePhase::Idle {
            return RefreshOutcome::Joined;
        }
        if self.running.load(Ordering::SeqCst) {
            self.refresh.notify_one();
            RefreshOutcome::Immediate
        } else {
            RefreshOutcome::Scheduled
        }
    }

    /// Runs a single refresh cycle, unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        {
            let mut phase = self.phase.write().await;
            if *phase != CyclePhase::Idle {
                return CycleOutcome::Skipped;
            }
            *phase = CyclePhase::Fetching;
        }

        let outcome = self.execute_cycle().await;

        {
            let mut stats = self.stats.write().await;
            stats.cycles_run += 1;
            stats.last_cycle_at = Some(Utc::now());
        }
        *self.phase.write().await = CyclePhase::Idle;
        outcome
    }

    async fn execute_cycle(&self) -> CycleOutcome {
        let collected = aggregator::collect(&self.sources, &self.config.aggregator).await;

        if collected.all_failed {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            let retry_in = self.backoff_for(failures);
            warn!(
                failures,
                ?retry_in,
                "every source failed; serving cached view as fallback"
            );

            match self.store.mark_fallback(Utc::now() + to_chrono(retry_in)).await {
                Ok(true) => {}
                Ok(false) => debug!("no cached view to mark as fallback"),
                Err(err) => warn!(error = %err, "failed to mark cached fallback"),
            }

            let mut stats = self.stats.write().await;
            stats.failed_cycles += 1;
            return CycleOutcome::Fallback;
        }
        self.consecutive_failures.store(0, Ordering::SeqCst);

        *self.phase.write().await = CyclePhase::Reconciling;

        let prior = match self.store.current().await {
            Ok(prior) => prior,
            Err(err) => {
                warn!(error = %err, "could not read prior view; reconciling without it");
                None
            }
        };

        let view = self
            .reconciler
            .reconcile(&collected.reports, prior.as_ref().map(|s| &s.view));

        let accelerate =
            view.has_transitions() || view.status == ValidationStatus::Conflicted;
        self.accelerate_next.store(accelerate, Ordering::SeqCst);
        if accelerate {
            info!(
                transitions = view.transitions.len(),
                status = %view.status,
                "change suspected; next refresh accelerated"
            );
        }

        let next_interval = if accelerate {
            self.config.accelerated_interval
        } else {
            self.config.steady_interval
        };
        let freshness = Freshness {
            generated_at: view.generated_at,
            next_refresh_at: view.generated_at + to_chrono(next_interval),
            cached_fallback: false,
        };

        let generated_at = view.generated_at;
        match self.store.publish(view, freshness).await {
            Ok(()) => {
                *self.phase.write().await = CyclePhase::Published;
                let mut stats = self.stats.write().await;
                stats.views_published += 1;
                info!(%generated_at, "published reconciled view");
            }
            Err(StoreError::StaleWrite { incoming, current }) => {
                // A cycle that started later already published a newer
                // view; dropping ours is correct.
                warn!(%incoming, %current, "dropped out-of-order view");
                let mut stats = self.stats.write().await;
                stats.stale_writes += 1;
            }
            Err(err) => {
                warn!(error = %err, "failed to publish reconciled view");
            }
        }

        CycleOutcome::Published
    }

    fn backoff_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        let wait = self
            .config
            .backoff_floor
            .saturating_mul(2u32.saturating_pow(exp));
        wait.min(self.config.backoff_ceiling)
    }

    fn next_wait(&self) -> Duration {
        let failures = self.consecutive_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.backoff_for(failures)
        } else if self.accelerate_next.load(Ordering::SeqCst) {
            self.config.accelerated_interval
        } else {
            self.config.steady_interval
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::ReconcilerConfig;
    use crate::report::RawCrewRecord;
    use crate::source::{SourceError, SourceResult};
    use crate::store::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct ScriptedSource {
        id: String,
        rosters: RwLock<Vec<SourceResult<Vec<RawCrewRecord>>>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RosterSource for ScriptedSource {
        fn id(&self) -> &str {
            &self.id
        }

        async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut rosters = self.rosters.write().await;
            if rosters.len() > 1 {
                rosters.remove(0)
            } else {
                rosters[0].clone()
            }
        }
    }

    fn record(name: &str) -> RawCrewRecord {
        let mut attributes = BTreeMap::new();
        attributes.insert("status".to_string(), "active".to_string());
        RawCrewRecord {
            name: name.to_string(),
            external_id: None,
            attributes,
            mission: None,
        }
    }

    fn source(id: &str, rosters: Vec<SourceResult<Vec<RawCrewRecord>>>) -> Arc<dyn RosterSource> {
        Arc::new(ScriptedSource {
            id: id.to_string(),
            rosters: RwLock::new(rosters),
            delay: None,
        })
    }

    fn slow_source(id: &str, delay: Duration) -> Arc<dyn RosterSource> {
        Arc::new(ScriptedSource {
            id: id.to_string(),
            rosters: RwLock::new(vec![Ok(vec![record("Jane Doe")])]),
            delay: Some(delay),
        })
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            steady_interval: Duration::from_secs(600),
            accelerated_interval: Duration::from_secs(60),
            backoff_floor: Duration::from_secs(10),
            backoff_ceiling: Duration::from_secs(40),
            aggregator: AggregatorConfig {
                per_source_timeout: Duration::from_millis(200),
                grace: Duration::from_millis(50),
            },
        }
    }

    fn scheduler_with(
        sources: Vec<Arc<dyn RosterSource>>,
        store: Arc<dyn SnapshotStore>,
    ) -> RefreshScheduler {
        let ids: Vec<String> = sources.iter().map(|s| s.id().to_string()).collect();
        RefreshScheduler::new(
            test_config(),
            sources,
            Reconciler::new(ReconcilerConfig::new(ids)),
            store,
        )
    }

    #[tokio::test]
    async fn test_cycle_publishes_view() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = scheduler_with(
            vec![source("a", vec![Ok(vec![record("Jane Doe")])])],
            store.clone(),
        );

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Published);

        let snapshot = store.current().await.unwrap().unwrap();
        assert_eq!(snapshot.view.members.len(), 1);
        assert!(!snapshot.freshness.cached_fallback);
        assert_eq!(scheduler.stats().await.views_published, 1);
    }

    #[tokio::test]
    async fn test_generation_timestamps_strictly_increase() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = scheduler_with(
            vec![source("a", vec![Ok(vec![record("Jane Doe")])])],
            store.clone(),
        );

        scheduler.run_cycle().await;
        let first = store.current().await.unwrap().unwrap().view.generated_at;
        scheduler.run_cycle().await;
        let second = store.current().await.unwrap().unwrap().view.generated_at;

        assert!(second > first);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_cached_view_with_fallback_flag() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = scheduler_with(
            vec![source(
                "a",
                vec![
                    Ok(vec![record("Jane Doe")]),
                    Err(SourceError::Unreachable("down".into())),
                ],
            )],
            store.clone(),
        );

        scheduler.run_cycle().await;
        let before = store.current().await.unwrap().unwrap();

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Fallback);
        let after = store.current().await.unwrap().unwrap();

        assert_eq!(after.view.generated_at, before.view.generated_at);
        assert!(after.freshness.cached_fallback);
    }

    #[tokio::test]
    async fn test_backoff_grows_and_caps() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = scheduler_with(
            vec![source("a", vec![Err(SourceError::Unreachable("down".into()))])],
            store,
        );

        scheduler.run_cycle().await;
        assert_eq!(scheduler.next_wait(), Duration::from_secs(10));
        scheduler.run_cycle().await;
        assert_eq!(scheduler.next_wait(), Duration::from_secs(20));
        scheduler.run_cycle().await;
        assert_eq!(scheduler.next_wait(), Duration::from_secs(40));
        scheduler.run_cycle().await;
        // Capped at the ceiling.
        assert_eq!(scheduler.next_wait(), Duration::from_secs(40));
    }

    #[tokio::test]
    async fn test_departure_arms_accelerated_interval() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = scheduler_with(
            vec![source(
                "a",
                vec![
                    Ok(vec![record("Jane Doe"), record("Bob Roe")]),
                    Ok(vec![record("Jane Doe")]),
                ],
            )],
            store.clone(),
        );

        scheduler.run_cycle().await;
        assert_eq!(scheduler.next_wait(), Duration::from_secs(600));

        scheduler.run_cycle().await;
        let snapshot = store.current().await.unwrap().unwrap();
        assert!(snapshot.view.has_transitions());
        assert_eq!(scheduler.next_wait(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_manual_refresh_joins_in_flight_cycle() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = Arc::new(scheduler_with(
            vec![slow_source("a", Duration::from_millis(100))],
            store,
        ));

        let inner = scheduler.clone();
        let cycle = tokio::spawn(async move { inner.run_cycle().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(scheduler.request_refresh().await, RefreshOutcome::Joined);
        assert_eq!(cycle.await.unwrap(), CycleOutcome::Published);
    }

    #[tokio::test]
    async fn test_manual_refresh_without_loop_is_scheduled() {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = scheduler_with(vec![source("a", vec![Ok(vec![])])], store);
        assert_eq!(scheduler.request_refresh().await, RefreshOutcome::Scheduled);
    }
}
