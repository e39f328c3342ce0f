//! Mission records attached to crew members.
//!
//! A mission opens when a member becomes active with mission context and
//! closes (never deletes) when the member leaves the active roster, so the
//! record survives for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw mission context as reported by a provider, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionContext {
    /// Authority that owns the mission (agency, program).
    pub authority: String,
    /// Free-text mission purpose.
    pub purpose: String,
    /// Mission start, when the provider reports one.
    pub started_at: Option<DateTime<Utc>>,
    /// Expected end, when the provider reports one.
    pub expected_end: Option<DateTime<Utc>>,
}

/// Lifecycle state of a mission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    Open,
    Closed,
}

/// A mission associated with at most one crew member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Deterministic mission id, derived from the member key and context so
    /// that re-reconciling identical reports yields identical records.
    pub id: Uuid,
    /// Identity key of the associated member, if any.
    pub member_key: Option<String>,
    /// When the mission started.
    pub started_at: DateTime<Utc>,
    /// Expected end, if known.
    pub expected_end: Option<DateTime<Utc>>,
    /// Owning authority.
    pub authority: String,
    /// Free-text purpose.
    pub purpose: String,
    /// Lifecycle state.
    pub state: MissionState,
    /// When the mission was closed, if it has been.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Mission {
    /// Opens a mission for a member from provider-reported context.
    ///
    /// `fallback_start` is used when the context carries no start time
    /// (typically the generation timestamp of the cycle that saw the member
    /// appear).
    pub fn open(member_key: &str, context: &MissionContext, fallback_start: DateTime<Utc>) -> Self {
        let started_at = context.started_at.unwrap_or(fallback_start);
        let seed = format!(
            "{}|{}|{}",
            member_key, context.authority, context.purpose
        );
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()),
            member_key: Some(member_key.to_string()),
            started_at,
            expected_end: context.expected_end,
            authority: context.authority.clone(),
            purpose: context.purpose.clone(),
            state: MissionState::Open,
            closed_at: None,
        }
    }

    /// Closes the mission, retaining it for audit.
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.state = MissionState::Closed;
        self.closed_at = Some(at);
    }

    /// True while the mission is open.
    pub fn is_open(&self) -> bool {
        self.state == MissionState::Open
    }
}
