//! Finalized-session history domain.

mod model;

pub use model::HistoryEntry;
