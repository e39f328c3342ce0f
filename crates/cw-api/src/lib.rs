//! # cw-api
//!
//! Read/trigger HTTP boundary over the crew-watch service facade: get the
//! current roster, get a member, request a refresh. The API holds no
//! reconciliation logic; it only shapes what the facade returns.

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
