//! The reconciled view: the authoritative, validated snapshot.

use crate::entity::CrewMember;
use crate::mission::Mission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary validation status of a whole view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Every attribute of every member is multi-source agreed.
    Consistent,
    /// At least one attribute rests on a single provider.
    Partial,
    /// At least one member has a disputed attribute.
    Conflicted,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Consistent => "consistent",
            Self::Partial => "partial",
            Self::Conflicted => "conflicted",
        };
        write!(f, "{}", s)
    }
}

/// A roster change detected between two successive views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "change", content = "key")]
pub enum RosterTransition {
    /// Member present now, absent in the previous view.
    Appeared(String),
    /// Member absent now, present in the previous view.
    Departed(String),
}

impl RosterTransition {
    /// The identity key the transition refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::Appeared(k) | Self::Departed(k) => k,
        }
    }
}

/// The validated, confidence-scored snapshot across all providers.
///
/// Immutable once published; each refresh cycle produces a new view that
/// supersedes the prior one in the snapshot store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledView {
    /// Generation timestamp; strictly increasing across published views.
    pub generated_at: DateTime<Utc>,
    /// Members, ordered by ascending identity key.
    pub members: Vec<CrewMember>,
    /// Providers consulted this cycle (successful or not), sorted.
    pub providers_consulted: Vec<String>,
    /// Summary validation status.
    pub status: ValidationStatus,
    /// Appeared/departed transitions versus the previous view.
    pub transitions: Vec<RosterTransition>,
    /// Open missions attached to current members.
    pub missions: Vec<Mission>,
    /// Closed missions, retained for audit and carried forward.
    pub closed_missions: Vec<Mission>,
}

impl ReconciledView {
    /// Looks up a member by identity key.
    ///
    /// Members are kept sorted by key, so this is a binary search.
    pub fn member(&self, key: &str) -> Option<&CrewMember> {
        self.members
            .binary_search_by(|m| m.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.members[idx])
    }

    /// Identity keys of all members, in order.
    pub fn member_keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.key.as_str())
    }

    /// True when any appeared/departed transition was detected.
    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// The open mission attached to a member, if any.
    pub fn mission_for(&self, key: &str) -> Option<&Mission> {
        self.missions
            .iter()
            .find(|m| m.member_key.as_deref() == Some(key))
    }
}

/// Freshness metadata describing how current the served view is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Freshness {
    /// Generation timestamp of the current view.
    pub generated_at: DateTime<Utc>,
    /// When the next scheduled refresh is expected.
    pub next_refresh_at: DateTime<Utc>,
    /// Set when a cycle failed to improve on stale data and the served view
    /// is a cached fallback.
    pub cached_fallback: bool,
}

/// What the snapshot store holds: the current view plus its freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub view: ReconciledView,
    pub freshness: Freshness,
}
