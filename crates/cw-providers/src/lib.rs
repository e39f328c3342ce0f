//! # cw-providers
//!
//! Roster provider implementations (source adapters) for crew-watch.
//!
//! Each provider implements [`cw_core::RosterSource`]: fetch the
//! provider's current view of who is active and map it to the common
//! record shape. Providers are stateless, replaceable, and independently
//! testable; the set of active providers is driven by configuration, not
//! by per-provider branching.

pub mod agency_roster;
pub mod http;
pub mod mock;
pub mod open_notify;

pub use agency_roster::{AgencyRosterConfig, AgencyRosterProvider};
pub use http::{AuthConfig, HttpClient, HttpClientConfig};
pub use mock::{crew_record, MockBehavior, MockRosterProvider};
pub use open_notify::{OpenNotifyConfig, OpenNotifyProvider};
