//! Provider for the Open Notify-style "people in space" feed.
//!
//! The feed is a flat list of everyone currently in space with the craft
//! they are aboard:
//!
//! ```json
//! {"message": "success", "number": 2,
//!  "people": [{"name": "Jane Doe", "craft": "ISS"}]}
//! ```
//!
//! It carries no stable ids, affiliations, or mission data; everyone it
//! lists is by definition currently active.

use crate::http::{HttpClient, HttpClientConfig};
use async_trait::async_trait;
use cw_core::entity::{ATTR_LOCATION, ATTR_STATUS};
use cw_core::report::RawCrewRecord;
use cw_core::source::{RosterSource, SourceResult};
use serde::Deserialize;
use tracing::debug;

/// Default public endpoint for the feed.
pub const DEFAULT_BASE_URL: &str = "http://api.open-notify.org";

/// Configuration for the Open Notify provider.
#[derive(Debug, Clone)]
pub struct OpenNotifyConfig {
    /// Provider id used in provenance and configuration.
    pub id: String,
    /// HTTP settings; base URL defaults to the public endpoint.
    pub http: HttpClientConfig,
    /// When set, only people aboard this craft are reported.
    pub craft_filter: Option<String>,
}

impl Default for OpenNotifyConfig {
    fn default() -> Self {
        Self {
            id: "open-notify".to_string(),
            http: HttpClientConfig::new(DEFAULT_BASE_URL),
            craft_filter: None,
        }
    }
}

/// Roster provider backed by the people-in-space feed.
pub struct OpenNotifyProvider {
    id: String,
    craft_filter: Option<String>,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct PeopleResponse {
    people: Vec<Person>,
}

#[derive(Debug, Deserialize)]
struct Person {
    name: String,
    craft: String,
}

impl OpenNotifyProvider {
    /// Creates the provider from configuration.
    pub fn new(config: OpenNotifyConfig) -> SourceResult<Self> {
        Ok(Self {
            id: config.id,
            craft_filter: config.craft_filter,
            http: HttpClient::new(config.http)?,
        })
    }

    fn to_record(&self, person: Person) -> RawCrewRecord {
        RawCrewRecord::named(person.name)
            .with_attribute(ATTR_LOCATION, person.craft)
            // The feed only lists people currently in space.
            .with_attribute(ATTR_STATUS, "active")
    }
}

#[async_trait]
impl RosterSource for OpenNotifyProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>> {
        let response: PeopleResponse = self.http.get_json("/astros.json").await?;
        debug!(provider = %self.id, people = response.people.len(), "fetched people in space");

        let records = response
            .people
            .into_iter()
            .filter(|p| {
                self.craft_filter
                    .as_deref()
                    .map(|craft| p.craft.eq_ignore_ascii_case(craft))
                    .unwrap_or(true)
            })
            .map(|p| self.to_record(p))
            .collect();
        Ok(records)
    }
}
