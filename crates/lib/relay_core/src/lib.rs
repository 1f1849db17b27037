//! # relay_core
//!
//! Agent service client and relay orchestration.

pub mod agents;
pub mod relay;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
