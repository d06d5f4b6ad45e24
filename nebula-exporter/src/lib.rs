//! nebula-exporter library crate.
//!
//! Host and CasparCG playout telemetry for pull-based metric scrapers. The
//! binary wires these modules together; they are exposed for integration
//! testing.

pub mod api;
pub mod caspar;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Error, Result};
