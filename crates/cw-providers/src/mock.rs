//! Mock roster provider for testing.
//!
//! Configurable test double: preloaded records, failure injection, and
//! latency simulation, with a fetch history for verification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cw_core::entity::{ATTR_LOCATION, ATTR_STATUS};
use cw_core::report::RawCrewRecord;
use cw_core::source::{RosterSource, SourceError, SourceResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Failure-injection behavior.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Serve the configured records normally.
    #[default]
    Normal,
    /// Fail every fetch with the given error.
    AlwaysFail(SourceError),
    /// Succeed for the first `calls` fetches, then fail.
    FailAfter { calls: u64, error: SourceError },
    /// Sleep before answering, to exercise timeouts.
    WithLatency(Duration),
}

/// Configurable mock roster provider.
pub struct MockRosterProvider {
    id: String,
    records: RwLock<Vec<RawCrewRecord>>,
    behavior: RwLock<MockBehavior>,
    call_count: AtomicU64,
    fetch_history: RwLock<Vec<DateTime<Utc>>>,
}

impl MockRosterProvider {
    /// Creates an empty mock provider.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            records: RwLock::new(Vec::new()),
            behavior: RwLock::new(MockBehavior::Normal),
            call_count: AtomicU64::new(0),
            fetch_history: RwLock::new(Vec::new()),
        }
    }

    /// Creates a mock provider preloaded with records.
    pub fn with_records(id: &str, records: Vec<RawCrewRecord>) -> Self {
        Self {
            id: id.to_string(),
            records: RwLock::new(records),
            behavior: RwLock::new(MockBehavior::Normal),
            call_count: AtomicU64::new(0),
            fetch_history: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the served records.
    pub async fn set_records(&self, records: Vec<RawCrewRecord>) {
        *self.records.write().await = records;
    }

    /// Sets the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Number of fetches made so far.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Timestamps of every fetch, for verification.
    pub async fn fetch_history(&self) -> Vec<DateTime<Utc>> {
        self.fetch_history.read().await.clone()
    }
}

/// Builds an active crew record aboard a craft; shorthand for tests.
pub fn crew_record(name: &str, craft: &str) -> RawCrewRecord {
    RawCrewRecord::named(name)
        .with_attribute(ATTR_LOCATION, craft)
        .with_attribute(ATTR_STATUS, "active")
}

#[async_trait]
impl RosterSource for MockRosterProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>> {
        self.fetch_history.write().await.push(Utc::now());
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        let behavior = self.behavior.read().await.clone();
        match behavior {
            MockBehavior::Normal => {}
            MockBehavior::AlwaysFail(err) => return Err(err),
            MockBehavior::FailAfter { calls, error } => {
                if count > calls {
                    return Err(error);
                }
            }
            MockBehavior::WithLatency(delay) => tokio::time::sleep(delay).await,
        }

        Ok(self.records.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_configured_records() {
        let provider = MockRosterProvider::with_records(
            "mock-1",
            vec![crew_record("Jane Doe", "ISS"), crew_record("Bob Roe", "ISS")],
        );

        let records = provider.fetch_roster().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_fail() {
        let provider = MockRosterProvider::new("mock-1");
        provider
            .set_behavior(MockBehavior::AlwaysFail(SourceError::Unreachable(
                "injected".to_string(),
            )))
            .await;

        assert!(provider.fetch_roster().await.is_err());
    }

    #[tokio::test]
    async fn test_fail_after() {
        let provider = MockRosterProvider::with_records("mock-1", vec![]);
        provider
            .set_behavior(MockBehavior::FailAfter {
                calls: 2,
                error: SourceError::Timeout("injected".to_string()),
            })
            .await;

        assert!(provider.fetch_roster().await.is_ok());
        assert!(provider.fetch_roster().await.is_ok());
        assert!(matches!(
            provider.fetch_roster().await,
            Err(SourceError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_history() {
        let provider = MockRosterProvider::with_records("mock-1", vec![]);
        provider.fetch_roster().await.unwrap();
        provider.fetch_roster().await.unwrap();

        assert_eq!(provider.fetch_history().await.len(), 2);
    }
}
