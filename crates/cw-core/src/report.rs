//! Per-provider fetch reports.
//!
//! A `SourceReport` is one provider's answer for one refresh cycle. It is
//! ephemeral: the reconciler consumes it and only provenance fields survive
//! into the published view.

use crate::mission::MissionContext;
use crate::source::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A provider-shaped crew record, prior to reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCrewRecord {
    /// Display name as reported.
    pub name: String,
    /// Cross-provider identifier, when the provider supplies a stable one.
    pub external_id: Option<String>,
    /// Additional attributes (affiliation, location, status, ...).
    pub attributes: BTreeMap<String, String>,
    /// Mission context, when the provider carries one.
    pub mission: Option<MissionContext>,
}

impl RawCrewRecord {
    /// Creates a record with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_id: None,
            attributes: BTreeMap::new(),
            mission: None,
        }
    }

    /// Adds an attribute, builder-style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the cross-provider id, builder-style.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Attaches mission context, builder-style.
    pub fn with_mission(mut self, mission: MissionContext) -> Self {
        self.mission = Some(mission);
        self
    }
}

/// Structured failure kind for a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FetchFailure {
    /// The provider did not answer within the allotted time.
    Timeout(String),
    /// The provider could not be reached at all.
    Unreachable(String),
    /// The provider answered with something that could not be parsed.
    MalformedResponse(String),
    /// The provider rejected our credentials.
    AuthFailure(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(d) => write!(f, "timeout: {}", d),
            Self::Unreachable(d) => write!(f, "unreachable: {}", d),
            Self::MalformedResponse(d) => write!(f, "malformed response: {}", d),
            Self::AuthFailure(d) => write!(f, "auth failure: {}", d),
        }
    }
}

impl From<SourceError> for FetchFailure {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Timeout(d) => Self::Timeout(d),
            SourceError::Unreachable(d) => Self::Unreachable(d),
            SourceError::MalformedResponse(d) => Self::MalformedResponse(d),
            SourceError::AuthFailure(d) => Self::AuthFailure(d),
            // A misconfigured source cannot be reached in any useful sense.
            SourceError::Configuration(d) => Self::Unreachable(d),
        }
    }
}

/// Success or structured failure of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FetchOutcome {
    Success,
    Failure {
        #[serde(flatten)]
        failure: FetchFailure,
    },
}

/// One provider's answer for one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Provider id.
    pub provider: String,
    /// When the fetch completed (or failed).
    pub fetched_at: DateTime<Utc>,
    /// Raw records; empty on failure.
    pub records: Vec<RawCrewRecord>,
    /// Success/failure indicator.
    pub outcome: FetchOutcome,
}

impl SourceReport {
    /// Builds a successful report.
    pub fn success(provider: impl Into<String>, records: Vec<RawCrewRecord>) -> Self {
        Self {
            provider: provider.into(),
            fetched_at: Utc::now(),
            records,
            outcome: FetchOutcome::Success,
        }
    }

    /// Builds a failed report.
    pub fn failure(provider: impl Into<String>, failure: FetchFailure) -> Self {
        Self {
            provider: provider.into(),
            fetched_at: Utc::now(),
            records: Vec::new(),
            outcome: FetchOutcome::Failure { failure },
        }
    }

    /// True when the fetch succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success)
    }

    /// The failure, if the fetch failed.
    pub fn failure_kind(&self) -> Option<&FetchFailure> {
        match &self.outcome {
            FetchOutcome::Failure { failure } => Some(failure),
            FetchOutcome::Success => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_constructors() {
        let ok = SourceReport::success("open-notify", vec![RawCrewRecord::named("Jane Doe")]);
        assert!(ok.is_success());
        assert_eq!(ok.records.len(), 1);
        assert!(ok.failure_kind().is_none());

        let failed = SourceReport::failure(
            "agency-roster",
            FetchFailure::Timeout("no response in 10s".to_string()),
        );
        assert!(!failed.is_success());
        assert!(failed.records.is_empty());
        assert!(matches!(
            failed.failure_kind(),
            Some(FetchFailure::Timeout(_))
        ));
    }

    #[test]
    fn test_failure_from_source_error() {
        let failure: FetchFailure = SourceError::AuthFailure("401".to_string()).into();
        assert_eq!(failure, FetchFailure::AuthFailure("401".to_string()));

        let failure: FetchFailure = SourceError::Configuration("bad url".to_string()).into();
        assert!(matches!(failure, FetchFailure::Unreachable(_)));
    }

    #[test]
    fn test_record_builder() {
        let record = RawCrewRecord::named("Jane Doe")
            .with_external_id("nasa-001")
            .with_attribute("location", "ISS");

        assert_eq!(record.external_id.as_deref(), Some("nasa-001"));
        assert_eq!(record.attributes.get("location").unwrap(), "ISS");
    }

    #[test]
    fn test_outcome_serialization() {
        let failed = SourceReport::failure(
            "x",
            FetchFailure::MalformedResponse("unexpected shape".to_string()),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["outcome"]["outcome"], "failure");
        assert_eq!(json["outcome"]["kind"], "malformed_response");
    }
}
