//! Domain layer for the dwell usage tracker.
//!
//! Holds the records the lifecycle engine persists and reports, the traits
//! for every collaborator it talks to, and the shared error and config types.
//! Nothing in here performs I/O on its own.

pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod report;
pub mod session;
pub mod store;

// Re-export common error type
pub use error::{DwellError, Result};
