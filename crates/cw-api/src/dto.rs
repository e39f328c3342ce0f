//! Response DTOs for the roster API.

use chrono::{DateTime, Utc};
use cw_core::{
    CrewMember, Freshness, Mission, ReconciledView, RefreshOutcome, RosterTransition, Snapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Freshness metadata as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessDto {
    /// Generation timestamp of the served view.
    pub generated_at: DateTime<Utc>,
    /// When the next scheduled refresh is expected.
    pub next_refresh_at: DateTime<Utc>,
    /// True when the served view is a stale cached fallback.
    pub cached_fallback: bool,
}

impl From<&Freshness> for FreshnessDto {
    fn from(f: &Freshness) -> Self {
        Self {
            generated_at: f.generated_at,
            next_refresh_at: f.next_refresh_at,
            cached_fallback: f.cached_fallback,
        }
    }
}

/// One member in the roster listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    /// Stable identity key; use it for the detail endpoint.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Current location, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Affiliation, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    /// Activity status.
    pub status: cw_core::CrewStatus,
    /// Cross-source confidence in [0, 1].
    pub confidence: f64,
}

impl From<&CrewMember> for MemberSummary {
    fn from(m: &CrewMember) -> Self {
        Self {
            key: m.key.clone(),
            name: m.display_name().to_string(),
            location: m.attribute(cw_core::ATTR_LOCATION).map(String::from),
            affiliation: m.attribute(cw_core::ATTR_AFFILIATION).map(String::from),
            status: m.status,
            confidence: m.confidence,
        }
    }
}

/// Full member detail, including per-attribute provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub summary: MemberSummary,
    /// Reconciled attributes with agreement levels and raw observations.
    pub attributes: BTreeMap<String, cw_core::AttributeState>,
    /// Providers that reported this member.
    pub reported_by: Vec<String>,
}

impl From<&CrewMember> for MemberDetail {
    fn from(m: &CrewMember) -> Self {
        Self {
            summary: MemberSummary::from(m),
            attributes: m.attributes.clone(),
            reported_by: m.reported_by.clone(),
        }
    }
}

/// The current roster response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterResponse {
    /// Generation timestamp of the view.
    pub generated_at: DateTime<Utc>,
    /// Summary validation status.
    pub status: cw_core::ValidationStatus,
    /// Members, ordered by identity key.
    pub members: Vec<MemberSummary>,
    /// Providers consulted this cycle.
    pub providers_consulted: Vec<String>,
    /// Appeared/departed transitions since the previous view.
    pub transitions: Vec<RosterTransition>,
    /// Open missions.
    pub missions: Vec<Mission>,
    /// Freshness metadata; clients are expected to render staleness and
    /// confidence rather than assume correctness.
    pub freshness: FreshnessDto,
}

impl From<&Snapshot> for RosterResponse {
    fn from(snapshot: &Snapshot) -> Self {
        let view: &ReconciledView = &snapshot.view;
        Self {
            generated_at: view.generated_at,
            status: view.status,
            members: view.members.iter().map(MemberSummary::from).collect(),
            providers_consulted: view.providers_consulted.clone(),
            transitions: view.transitions.clone(),
            missions: view.missions.clone(),
            freshness: FreshnessDto::from(&snapshot.freshness),
        }
    }
}

/// Response to a manual refresh request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// How the request was satisfied.
    pub outcome: RefreshOutcome,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status string.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// True when a snapshot has ever been published.
    pub populated: bool,
    /// Freshness of the current snapshot, when populated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<FreshnessDto>,
}
