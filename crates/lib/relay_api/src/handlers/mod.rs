//! Request handlers.

pub mod docs;
pub mod relay;
