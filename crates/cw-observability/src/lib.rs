//! # cw-observability
//!
//! Structured logging setup shared by the crew-watch binaries.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
