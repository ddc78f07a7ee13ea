pub mod config_service;
pub mod http_collector;
pub mod logging;
pub mod paths;
pub mod signals;
pub mod storage;

pub use crate::http_collector::HttpCollector;
pub use crate::signals::{BroadcastLifecycleSource, ManualConnectivity};
pub use crate::storage::{InMemoryStore, JsonFileStore};
