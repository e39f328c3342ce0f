//! Cross-source reconciliation: merging provider reports into one
//! validated, confidence-scored view.
//!
//! The reconciler is pure and CPU-bound. It never fails on malformed
//! input: records that cannot be normalized are dropped with a logged
//! reason, and provider failures arrive as data (failed reports), not as
//! errors.

mod matcher;

pub use matcher::{normalize_name, ExternalIdMatcher, IdentityMatcher, NormalizedNameMatcher};

use crate::entity::{
    Agreement, AttributeObservation, AttributeState, CrewMember, CrewStatus, ATTR_NAME,
    ATTR_STATUS,
};
use crate::mission::{Mission, MissionContext};
use crate::report::SourceReport;
use crate::view::{ReconciledView, RosterTransition, ValidationStatus};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Static reconciliation settings.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// Every provider the system is configured with, whether or not it
    /// answered this cycle. Drives the coverage part of the confidence
    /// score.
    pub configured_providers: Vec<String>,
    /// Static per-provider trust weights used to break attribute ties.
    /// Providers absent from the map weigh 1.0.
    pub trust_weights: HashMap<String, f64>,
}

impl ReconcilerConfig {
    /// Creates a config for the given provider ids with default weights.
    pub fn new(providers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            configured_providers: providers.into_iter().map(Into::into).collect(),
            trust_weights: HashMap::new(),
        }
    }

    /// Sets a provider's trust weight, builder-style.
    pub fn with_trust_weight(mut self, provider: impl Into<String>, weight: f64) -> Self {
        self.trust_weights.insert(provider.into(), weight);
        self
    }

    fn weight(&self, provider: &str) -> f64 {
        self.trust_weights.get(provider).copied().unwrap_or(1.0)
    }

    fn coverage(&self, reporters: usize) -> f64 {
        if self.configured_providers.is_empty() {
            return 1.0;
        }
        (reporters as f64 / self.configured_providers.len() as f64).min(1.0)
    }
}

/// A candidate entity being assembled from raw records.
#[derive(Debug, Default)]
struct Candidate {
    /// attribute name -> every (provider, raw value) observation.
    observations: BTreeMap<String, Vec<AttributeObservation>>,
    reporters: BTreeSet<String>,
    mission_contexts: Vec<MissionContext>,
}

/// Merges provider reports into reconciled views.
pub struct Reconciler {
    config: ReconcilerConfig,
    matcher: Arc<dyn IdentityMatcher>,
}

impl Reconciler {
    /// Creates a reconciler with the default normalized-name matcher.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self::with_matcher(config, Arc::new(NormalizedNameMatcher))
    }

    /// Creates a reconciler with a custom identity matching strategy.
    pub fn with_matcher(config: ReconcilerConfig, matcher: Arc<dyn IdentityMatcher>) -> Self {
        Self { config, matcher }
    }

    /// Reconciles one cycle's reports against the previous view.
    pub fn reconcile(
        &self,
        reports: &[SourceReport],
        prior: Option<&ReconciledView>,
    ) -> ReconciledView {
        self.reconcile_at(reports, prior, Utc::now())
    }

    /// Reconciliation with an explicit generation timestamp.
    ///
    /// Deterministic: the same reports, prior view, and timestamp always
    /// produce an identical view.
    pub fn reconcile_at(
        &self,
        reports: &[SourceReport],
        prior: Option<&ReconciledView>,
        generated_at: DateTime<Utc>,
    ) -> ReconciledView {
        let candidates = self.build_candidates(reports);

        let mut members = Vec::with_capacity(candidates.len());
        for (key, candidate) in &candidates {
            members.push(self.resolve_member(key, candidate, prior));
        }
        // candidates is a BTreeMap, so members are already in ascending key
        // order as §3 requires.

        let transitions = detect_transitions(&members, prior);
        let (missions, closed_missions) =
            roll_missions(&members, &candidates, prior, generated_at);
        let status = overall_status(&members);

        let mut providers_consulted: Vec<String> =
            reports.iter().map(|r| r.provider.clone()).collect();
        providers_consulted.sort();
        providers_consulted.dedup();

        ReconciledView {
            generated_at,
            members,
            providers_consulted,
            status,
            transitions,
            missions,
            closed_missions,
        }
    }

    /// Groups raw records from successful reports into candidates keyed by
    /// reconciled identity.
    fn build_candidates(&self, reports: &[SourceReport]) -> BTreeMap<String, Candidate> {
        let mut sorted: Vec<&SourceReport> = reports.iter().filter(|r| r.is_success()).collect();
        sorted.sort_by(|a, b| a.provider.cmp(&b.provider));

        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
        let mut dropped = 0usize;

        for report in sorted {
            for record in &report.records {
                let Some(key) = self.matcher.identity_key(record) else {
                    dropped += 1;
                    warn!(
                        provider = %report.provider,
                        name = %record.name,
                        "dropping record that could not be normalized to an identity"
                    );
                    continue;
                };

                let candidate = candidates.entry(key).or_default();
                candidate.reporters.insert(report.provider.clone());

                candidate
                    .observations
                    .entry(ATTR_NAME.to_string())
                    .or_default()
                    .push(AttributeObservation {
                        provider: report.provider.clone(),
                        value: record.name.clone(),
                    });

                for (attr, value) in &record.attributes {
                    candidate
                        .observations
                        .entry(attr.clone())
                        .or_default()
                        .push(AttributeObservation {
                            provider: report.provider.clone(),
                            value: value.clone(),
                        });
                }

                if let Some(mission) = &record.mission {
                    candidate.mission_contexts.push(mission.clone());
                }
            }
        }

        if dropped > 0 {
            debug!(dropped, "records dropped during candidate building");
        }
        candidates
    }

    /// Resolves one candidate into a crew member.
    fn resolve_member(
        &self,
        key: &str,
        candidate: &Candidate,
        prior: Option<&ReconciledView>,
    ) -> CrewMember {
        let prior_member = prior.and_then(|v| v.member(key));

        let mut attributes = BTreeMap::new();
        for (attr, observations) in &candidate.observations {
            let prior_value = prior_member.and_then(|m| m.attribute(attr));
            attributes.insert(
                attr.clone(),
                self.resolve_attribute(attr, observations, prior_value),
            );
        }

        let status = attributes
            .get(ATTR_STATUS)
            .and_then(|a| a.value())
            .map(CrewStatus::parse)
            .unwrap_or(CrewStatus::Unknown);

        let confidence = self.confidence(&attributes, candidate.reporters.len());

        CrewMember {
            key: key.to_string(),
            attributes,
            status,
            confidence,
            reported_by: candidate.reporters.iter().cloned().collect(),
        }
    }

    /// Resolves a single attribute from its observations.
    ///
    /// Agreement ladder: two independent providers agreeing is High, a
    /// single reporter is Medium, disagreement is Conflicted with the
    /// majority value kept (tie → higher trust weight → prior cycle's
    /// value → Unknown with no value).
    fn resolve_attribute(
        &self,
        attr: &str,
        observations: &[AttributeObservation],
        prior_value: Option<&str>,
    ) -> AttributeState {
        // Group by normalized value; remember the first raw spelling and
        // the distinct providers per group. BTreeMap keeps group iteration
        // deterministic. Names get the same normalization the identity
        // matcher uses, so spelling variants of one person agree instead
        // of conflicting.
        let normalize = |value: &str| {
            if attr == ATTR_NAME {
                normalize_name(value).unwrap_or_else(|| value.trim().to_lowercase())
            } else {
                value.trim().to_lowercase()
            }
        };

        let mut groups: BTreeMap<String, (String, BTreeSet<String>)> = BTreeMap::new();
        let mut sorted = observations.to_vec();
        sorted.sort_by(|a, b| (&a.provider, &a.value).cmp(&(&b.provider, &b.value)));

        for obs in &sorted {
            let norm = normalize(&obs.value);
            let entry = groups
                .entry(norm)
                .or_insert_with(|| (obs.value.trim().to_string(), BTreeSet::new()));
            entry.1.insert(obs.provider.clone());
        }

        let state = |value: Option<String>, agreement: Agreement| AttributeState {
            value,
            agreement,
            observations: sorted.clone(),
        };

        if groups.len() == 1 {
            let (raw, providers) = groups.into_values().next().expect("one group");
            let agreement = if providers.len() >= 2 {
                Agreement::High
            } else {
                Agreement::Medium
            };
            return state(Some(raw), agreement);
        }

        // Disagreement: rank groups by provider count, then total trust
        // weight, then normalized value for determinism.
        let mut ranked: Vec<(String, String, usize, f64)> = groups
            .into_iter()
            .map(|(norm, (raw, providers))| {
                let weight: f64 = providers.iter().map(|p| self.config.weight(p)).sum();
                (norm, raw, providers.len(), weight)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.2.cmp(&a.2)
                .then(b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.0.cmp(&b.0))
        });

        let top = &ranked[0];
        let second = &ranked[1];

        if top.2 > second.2 || top.3 > second.3 {
            // Clear majority, or a trust-weight winner among the count-tied.
            return state(Some(top.1.clone()), Agreement::Conflicted);
        }

        // Fully tied: keep the prior cycle's value if it is one of the tied
        // candidates, else give up on the attribute.
        if let Some(prior) = prior_value {
            let prior_norm = normalize(prior);
            let tied = ranked
                .iter()
                .take_while(|g| g.2 == top.2 && g.3 == top.3)
                .any(|g| g.0 == prior_norm);
            if tied {
                return state(Some(prior.trim().to_string()), Agreement::Conflicted);
            }
        }

        state(None, Agreement::Unknown)
    }

    /// Confidence: mean per-attribute agreement score, weighted by the
    /// fraction of configured providers that reported the member at all.
    fn confidence(&self, attributes: &BTreeMap<String, AttributeState>, reporters: usize) -> f64 {
        if attributes.is_empty() {
            return 0.0;
        }
        let sum: f64 = attributes
            .values()
            .map(|a| match a.agreement {
                Agreement::High => 1.0,
                Agreement::Medium => 0.6,
                Agreement::Conflicted => 0.2,
                Agreement::Unknown => 0.0,
            })
            .sum();
        let mean = sum / attributes.len() as f64;
        mean * self.config.coverage(reporters)
    }
}

/// Compares member keys against the previous view.
fn detect_transitions(
    members: &[CrewMember],
    prior: Option<&ReconciledView>,
) -> Vec<RosterTransition> {
    let Some(prior) = prior else {
        // First-ever view: nothing to compare against, so nothing counts
        // as appeared or departed.
        return Vec::new();
    };

    let now: BTreeSet<&str> = members.iter().map(|m| m.key.as_str()).collect();
    let before: BTreeSet<&str> = prior.member_keys().collect();

    let mut transitions = Vec::new();
    for key in now.difference(&before) {
        transitions.push(RosterTransition::Appeared((*key).to_string()));
    }
    for key in before.difference(&now) {
        transitions.push(RosterTransition::Departed((*key).to_string()));
    }
    transitions
}

/// Rolls mission records forward one cycle: keeps open missions for active
/// members, opens missions for newly active members with context, closes
/// missions whose member departed or went inactive.
fn roll_missions(
    members: &[CrewMember],
    candidates: &BTreeMap<String, Candidate>,
    prior: Option<&ReconciledView>,
    generated_at: DateTime<Utc>,
) -> (Vec<Mission>, Vec<Mission>) {
    let mut open: Vec<Mission> = Vec::new();
    let mut closed: Vec<Mission> = prior.map(|v| v.closed_missions.clone()).unwrap_or_default();

    let active: BTreeSet<&str> = members
        .iter()
        .filter(|m| m.status == CrewStatus::Active)
        .map(|m| m.key.as_str())
        .collect();

    if let Some(prior) = prior {
        for mission in &prior.missions {
            let still_active = mission
                .member_key
                .as_deref()
                .map(|k| active.contains(k))
                .unwrap_or(false);
            if still_active {
                open.push(mission.clone());
            } else {
                let mut mission = mission.clone();
                mission.close(generated_at);
                closed.push(mission);
            }
        }
    }

    for key in &active {
        if open.iter().any(|m| m.member_key.as_deref() == Some(key)) {
            continue;
        }
        let Some(candidate) = candidates.get(*key) else {
            continue;
        };
        let mut contexts = candidate.mission_contexts.clone();
        contexts.sort_by(|a, b| (&a.authority, &a.purpose).cmp(&(&b.authority, &b.purpose)));
        if let Some(context) = contexts.first() {
            open.push(Mission::open(key, context, generated_at));
        }
    }

    (open, closed)
}

/// Conflicted beats Partial beats Consistent.
fn overall_status(members: &[CrewMember]) -> ValidationStatus {
    if members.iter().any(|m| m.has_conflicts()) {
        ValidationStatus::Conflicted
    } else if members.iter().any(|m| m.has_single_source_attributes()) {
        ValidationStatus::Partial
    } else {
        ValidationStatus::Consistent
    }
}
