//! Concurrent fan-out over all configured roster sources.
//!
//! Each source fetch runs in its own task with its own timeout; one slow
//! or broken source never blocks or invalidates the others. The
//! aggregator does not interpret conflicts; it only collects reports.

use crate::report::{FetchFailure, SourceReport};
use crate::source::RosterSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Aggregation settings.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Time budget for each individual source fetch.
    pub per_source_timeout: Duration,
    /// Extra grace allowed on top of the per-source timeout before a task
    /// is abandoned outright.
    pub grace: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            per_source_timeout: Duration::from_secs(10),
            grace: Duration::from_secs(2),
        }
    }
}

/// Everything one aggregation cycle produced.
#[derive(Debug)]
pub struct CollectOutcome {
    /// One report per configured source, success or failure.
    pub reports: Vec<SourceReport>,
    /// True when no source produced a successful report; the scheduler
    /// falls back to the last cached view.
    pub all_failed: bool,
}

/// Fetches all sources in parallel and collects their reports.
///
/// The fan-out is bounded by the source count; a source that does not
/// finish within `per_source_timeout + grace` is aborted and recorded as
/// a timeout failure rather than awaited further.
pub async fn collect(
    sources: &[Arc<dyn RosterSource>],
    config: &AggregatorConfig,
) -> CollectOutcome {
    let mut handles = Vec::with_capacity(sources.len());

    for source in sources {
        let provider = source.id().to_string();
        let source = Arc::clone(source);
        let timeout = config.per_source_timeout;
        let task_provider = provider.clone();
        let handle = tokio::spawn(async move {
            let provider = task_provider;
            match tokio::time::timeout(timeout, source.fetch_roster()).await {
                Ok(Ok(records)) => {
                    debug!(provider = %provider, records = records.len(), "source fetch succeeded");
                    SourceReport::success(provider, records)
                }
                Ok(Err(err)) => {
                    warn!(provider = %provider, error = %err, "source fetch failed");
                    SourceReport::failure(provider, err.into())
                }
                Err(_) => {
                    warn!(provider = %provider, ?timeout, "source fetch timed out");
                    SourceReport::failure(
                        provider,
                        FetchFailure::Timeout(format!("no response within {:?}", timeout)),
                    )
                }
            }
        });
        handles.push((provider, handle));
    }

    let ceiling = config.per_source_timeout + config.grace;
    let mut reports = Vec::with_capacity(handles.len());

    for (provider, handle) in handles {
        match tokio::time::timeout(ceiling, handle).await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(join_err)) => {
                warn!(provider = %provider, error = %join_err, "source task failed");
                reports.push(SourceReport::failure(
                    provider,
                    FetchFailure::Unreachable(format!("fetch task failed: {}", join_err)),
                ));
            }
            Err(_) => {
                warn!(provider = %provider, ?ceiling, "abandoning source past grace period");
                reports.push(SourceReport::failure(
                    provider,
                    FetchFailure::Timeout(format!("abandoned after {:?}", ceiling)),
                ));
            }
        }
    }

    let all_failed = !reports.iter().any(SourceReport::is_success);
    CollectOutcome {
        reports,
        all_failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RawCrewRecord;
    use crate::source::{SourceError, SourceResult};
    use async_trait::async_trait;

    struct StaticSource {
        id: String,
        result: SourceResult<Vec<RawCrewRecord>>,
        delay: Option<Duration>,
    }

    impl StaticSource {
        fn ok(id: &str, names: &[&str]) -> Arc<dyn RosterSource> {
            Arc::new(Self {
                id: id.to_string(),
                result: Ok(names.iter().map(|n| RawCrewRecord::named(*n)).collect()),
                delay: None,
            })
        }

        fn failing(id: &str, err: SourceError) -> Arc<dyn RosterSource> {
            Arc::new(Self {
                id: id.to_string(),
                result: Err(err),
                delay: None,
            })
        }

        fn slow(id: &str, delay: Duration) -> Arc<dyn RosterSource> {
            Arc::new(Self {
                id: id.to_string(),
                result: Ok(vec![RawCrewRecord::named("Too Late")]),
                delay: Some(delay),
            })
        }
    }

    #[async_trait]
    impl RosterSource for StaticSource {
        fn id(&self) -> &str {
            &self.id
        }

        async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone()
        }
    }

    fn fast_config() -> AggregatorConfig {
        AggregatorConfig {
            per_source_timeout: Duration::from_millis(50),
            grace: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_collects_from_all_sources() {
        let sources = vec![
            StaticSource::ok("a", &["Jane Doe"]),
            StaticSource::ok("b", &["Bob Roe"]),
        ];

        let outcome = collect(&sources, &fast_config()).await;
        assert_eq!(outcome.reports.len(), 2);
        assert!(!outcome.all_failed);
        assert!(outcome.reports.iter().all(SourceReport::is_success));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let sources = vec![
            StaticSource::ok("a", &["Jane Doe"]),
            StaticSource::failing("b", SourceError::Unreachable("connection refused".into())),
        ];

        let outcome = collect(&sources, &fast_config()).await;
        assert_eq!(outcome.reports.len(), 2);
        assert!(!outcome.all_failed);

        let failed = outcome.reports.iter().find(|r| r.provider == "b").unwrap();
        assert!(matches!(
            failed.failure_kind(),
            Some(FetchFailure::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_source_recorded_as_timeout() {
        let sources = vec![
            StaticSource::ok("a", &["Jane Doe"]),
            StaticSource::slow("b", Duration::from_secs(5)),
        ];

        let outcome = collect(&sources, &fast_config()).await;
        let slow = outcome.reports.iter().find(|r| r.provider == "b").unwrap();
        assert!(matches!(
            slow.failure_kind(),
            Some(FetchFailure::Timeout(_))
        ));
        // The timed-out source never delivered its records.
        assert!(slow.records.is_empty());
        assert!(!outcome.all_failed);
    }

    #[tokio::test]
    async fn test_all_failed_flag() {
        let sources = vec![
            StaticSource::failing("a", SourceError::Timeout("slow".into())),
            StaticSource::failing("b", SourceError::AuthFailure("401".into())),
        ];

        let outcome = collect(&sources, &fast_config()).await;
        assert!(outcome.all_failed);
        assert_eq!(outcome.reports.len(), 2);
    }

    #[tokio::test]
    async fn test_no_sources_counts_as_failure() {
        let outcome = collect(&[], &fast_config()).await;
        assert!(outcome.all_failed);
        assert!(outcome.reports.is_empty());
    }
}
