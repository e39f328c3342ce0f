//! Application state shared across handlers.

use cw_core::CrewService;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The crew service facade; the API adds nothing on top of it.
    pub service: Arc<CrewService>,
}

impl AppState {
    /// Creates the state around a service facade.
    pub fn new(service: CrewService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
