//! Application layer for dwell.
//!
//! The session lifecycle engine: the controller state machine, its timers,
//! report delivery with the offline queue, startup recovery, the history
//! archive, and the `UsageTracker` composition root tying them together.

pub mod controller;
pub mod dispatcher;
pub mod history;
pub mod queue;
pub mod recovery;
pub mod reporter;
pub mod timer;
pub mod tracker;

#[cfg(test)]
mod test_support;

pub use controller::{ControllerDeps, LifecycleController};
pub use dispatcher::ReportDispatcher;
pub use history::HistoryArchive;
pub use queue::OfflineQueue;
pub use recovery::{RecoveryOutcome, StaleSessionRecovery};
pub use reporter::Reporter;
pub use tracker::{Collaborators, UsageTracker};
