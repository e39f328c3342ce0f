//! Crew member model and per-attribute reconciliation state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical attribute name for the member's display name.
pub const ATTR_NAME: &str = "name";
/// Canonical attribute name for the member's agency or organization.
pub const ATTR_AFFILIATION: &str = "affiliation";
/// Canonical attribute name for the member's current location (craft/station).
pub const ATTR_LOCATION: &str = "location";
/// Canonical attribute name for the member's activity status.
pub const ATTR_STATUS: &str = "status";

/// Activity status of a crew member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewStatus {
    /// Currently active in the tracked environment.
    Active,
    /// In transit to or from the tracked environment.
    Transitioning,
    /// Status could not be established from the available reports.
    Unknown,
}

impl CrewStatus {
    /// Parses a provider-reported status string.
    ///
    /// Unrecognized values map to `Unknown` rather than an error: status
    /// vocabulary differs per provider and an odd value must never sink a
    /// whole record.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" | "aboard" | "on-station" | "on_station" => Self::Active,
            "transitioning" | "in-transit" | "in_transit" | "launching" | "returning" => {
                Self::Transitioning
            }
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for CrewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Transitioning => "transitioning",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Cross-provider agreement level for one reconciled attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    /// At least two independent providers agree on the value.
    High,
    /// Exactly one provider reported the value.
    Medium,
    /// Providers disagree; the kept value (if any) won by majority or trust.
    Conflicted,
    /// Providers disagree and no tie-break could pick a value.
    Unknown,
}

/// One provider's raw observation of an attribute, kept as provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeObservation {
    /// Provider that reported the value.
    pub provider: String,
    /// The raw value exactly as reported.
    pub value: String,
}

/// Reconciled state of a single attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeState {
    /// The accepted value, or `None` when no tie-break could pick one.
    pub value: Option<String>,
    /// Cross-provider agreement level.
    pub agreement: Agreement,
    /// Every raw observation, including disputed values.
    pub observations: Vec<AttributeObservation>,
}

impl AttributeState {
    /// Returns the accepted value as a string slice, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// One tracked crew member in the reconciled view.
///
/// The identity `key` is provider-agnostic and stable across refresh cycles
/// for the same real-world person even when provider spellings differ; the
/// reconciler's identity matcher is responsible for producing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    /// Stable, normalized identity key.
    pub key: String,
    /// Reconciled attributes, keyed by canonical attribute name.
    ///
    /// A `BTreeMap` keeps iteration and serialization order deterministic,
    /// which the idempotent-reconciliation guarantee depends on.
    pub attributes: BTreeMap<String, AttributeState>,
    /// Activity status derived from the reconciled status attribute.
    pub status: CrewStatus,
    /// Cross-source agreement and coverage score in `[0, 1]`.
    pub confidence: f64,
    /// Providers that reported this member at all, sorted.
    pub reported_by: Vec<String>,
}

impl CrewMember {
    /// Returns the accepted value of the named attribute, if any.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|a| a.value())
    }

    /// Returns the member's display name (falls back to the identity key).
    pub fn display_name(&self) -> &str {
        self.attribute(ATTR_NAME).unwrap_or(&self.key)
    }

    /// True if any attribute is in a conflicted or unresolved state.
    pub fn has_conflicts(&self) -> bool {
        self.attributes
            .values()
            .any(|a| matches!(a.agreement, Agreement::Conflicted | Agreement::Unknown))
    }

    /// True if any attribute rests on a single provider's word.
    pub fn has_single_source_attributes(&self) -> bool {
        self.attributes
            .values()
            .any(|a| a.agreement == Agreement::Medium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(value: &str, agreement: Agreement) -> AttributeState {
        AttributeState {
            value: Some(value.to_string()),
            agreement,
            observations: vec![AttributeObservation {
                provider: "test".to_string(),
                value: value.to_string(),
            }],
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(CrewStatus::parse("active"), CrewStatus::Active);
        assert_eq!(CrewStatus::parse(" Aboard "), CrewStatus::Active);
        assert_eq!(CrewStatus::parse("in-transit"), CrewStatus::Transitioning);
        assert_eq!(CrewStatus::parse("returning"), CrewStatus::Transitioning);
        assert_eq!(CrewStatus::parse("retired"), CrewStatus::Unknown);
        assert_eq!(CrewStatus::parse(""), CrewStatus::Unknown);
    }

    #[test]
    fn test_member_conflict_flags() {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_NAME.to_string(), attr("Jane Doe", Agreement::High));
        attributes.insert(ATTR_LOCATION.to_string(), attr("ISS", Agreement::Medium));

        let mut member = CrewMember {
            key: "jane doe".to_string(),
            attributes,
            status: CrewStatus::Active,
            confidence: 0.8,
            reported_by: vec!["a".to_string()],
        };

        assert!(!member.has_conflicts());
        assert!(member.has_single_source_attributes());
        assert_eq!(member.display_name(), "Jane Doe");

        member.attributes.insert(
            ATTR_STATUS.to_string(),
            attr("active", Agreement::Conflicted),
        );
        assert!(member.has_conflicts());
    }

    #[test]
    fn test_display_name_falls_back_to_key() {
        let member = CrewMember {
            key: "j doe".to_string(),
            attributes: BTreeMap::new(),
            status: CrewStatus::Unknown,
            confidence: 0.0,
            reported_by: vec![],
        };
        assert_eq!(member.display_name(), "j doe");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CrewStatus::Transitioning).unwrap();
        assert_eq!(json, "\"transitioning\"");
        let parsed: CrewStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(parsed, CrewStatus::Active);
    }
}
