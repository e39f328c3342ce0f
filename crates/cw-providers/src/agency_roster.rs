//! Provider for agency crew-manifest feeds.
//!
//! Agency manifests are richer than the public people-in-space feed: they
//! carry stable crew ids, agency affiliation, per-person status, and the
//! mission each person is flying:
//!
//! ```json
//! {"crew": [{
//!    "id": "nasa-0042", "name": "Jane Doe", "agency": "NASA",
//!    "vehicle": "ISS", "status": "aboard",
//!    "mission": {"authority": "NASA", "purpose": "Expedition 99",
//!                "launched_at": "2026-01-10T12:00:00Z",
//!                "expected_return": "2026-07-10T12:00:00Z"}}]}
//! ```

use crate::http::{HttpClient, HttpClientConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cw_core::entity::{ATTR_AFFILIATION, ATTR_LOCATION, ATTR_STATUS};
use cw_core::mission::MissionContext;
use cw_core::report::RawCrewRecord;
use cw_core::source::{RosterSource, SourceResult};
use serde::Deserialize;
use tracing::debug;

/// Configuration for an agency roster provider.
#[derive(Debug, Clone)]
pub struct AgencyRosterConfig {
    /// Provider id used in provenance and configuration.
    pub id: String,
    /// HTTP settings for the manifest endpoint.
    pub http: HttpClientConfig,
    /// Path of the manifest resource on the base URL.
    pub manifest_path: String,
}

impl AgencyRosterConfig {
    /// Creates a config for the given id and base URL with the
    /// conventional manifest path.
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            http: HttpClientConfig::new(base_url),
            manifest_path: "/v1/crew/manifest".to_string(),
        }
    }
}

/// Roster provider backed by an agency crew manifest.
pub struct AgencyRosterProvider {
    id: String,
    manifest_path: String,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    crew: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: Option<String>,
    name: String,
    agency: Option<String>,
    vehicle: Option<String>,
    status: Option<String>,
    mission: Option<ManifestMission>,
}

#[derive(Debug, Deserialize)]
struct ManifestMission {
    authority: Option<String>,
    purpose: Option<String>,
    launched_at: Option<DateTime<Utc>>,
    expected_return: Option<DateTime<Utc>>,
}

impl AgencyRosterProvider {
    /// Creates the provider from configuration.
    pub fn new(config: AgencyRosterConfig) -> SourceResult<Self> {
        Ok(Self {
            id: config.id,
            manifest_path: config.manifest_path,
            http: HttpClient::new(config.http)?,
        })
    }

    fn to_record(&self, entry: ManifestEntry) -> RawCrewRecord {
        let mut record = RawCrewRecord::named(entry.name);

        if let Some(id) = entry.id {
            record = record.with_external_id(id);
        }
        if let Some(agency) = entry.agency {
            record = record.with_attribute(ATTR_AFFILIATION, agency);
        }
        if let Some(vehicle) = entry.vehicle {
            record = record.with_attribute(ATTR_LOCATION, vehicle);
        }
        // Manifests list assigned crew; absent status means aboard.
        let status = entry.status.unwrap_or_else(|| "active".to_string());
        record = record.with_attribute(ATTR_STATUS, status);

        if let Some(mission) = entry.mission {
            record = record.with_mission(MissionContext {
                authority: mission.authority.unwrap_or_else(|| "unknown".to_string()),
                purpose: mission.purpose.unwrap_or_default(),
                started_at: mission.launched_at,
                expected_end: mission.expected_return,
            });
        }

        record
    }
}

#[async_trait]
impl RosterSource for AgencyRosterProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>> {
        let response: ManifestResponse = self.http.get_json(&self.manifest_path).await?;
        debug!(provider = %self.id, crew = response.crew.len(), "fetched crew manifest");

        Ok(response
            .crew
            .into_iter()
            .map(|e| self.to_record(e))
            .collect())
    }
}
