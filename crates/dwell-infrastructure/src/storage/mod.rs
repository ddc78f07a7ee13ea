//! Storage implementations of the tracker's key/value seam.

mod atomic_file;
mod file_store;
mod memory_store;

pub use atomic_file::AtomicFile;
pub use file_store::JsonFileStore;
pub use memory_store::InMemoryStore;
