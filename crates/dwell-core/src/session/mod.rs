//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the open session record (`SessionState`) and its phase
//! - `lifecycle`: app visibility signals and their source trait

mod lifecycle;
mod model;

pub use lifecycle::{AppLifecycleEvent, AppLifecycleSource};
pub use model::{DeviceMetadata, SessionPhase, SessionState};
