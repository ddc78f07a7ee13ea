//! Reporting domain: payloads, outcomes, and the collector/connectivity seams.

mod collector;
mod connectivity;
mod model;

pub use collector::{UsageCollector, send_item};
pub use connectivity::ConnectivityOracle;
pub use model::{CloseReason, DeliveryOutcome, QueueItem, ReplaySummary, ReportOutcome};
