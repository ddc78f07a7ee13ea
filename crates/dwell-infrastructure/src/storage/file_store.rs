//! Directory-backed key/value store.
//!
//! Every key maps to `<root>/<sanitized key>.json`. File operations run on
//! the blocking pool so the lifecycle engine never stalls the runtime on disk
//! I/O.

use super::atomic_file::AtomicFile;
use async_trait::async_trait;
use dwell_core::error::{DwellError, Result};
use dwell_core::store::KeyValueStore;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, key: &str) -> AtomicFile {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        AtomicFile::new(self.root.join(format!("{}.json", name)))
    }

    async fn run_blocking<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(AtomicFile) -> Result<T> + Send + 'static,
    {
        let file = self.file_for(key);
        tokio::task::spawn_blocking(move || op(file))
            .await
            .map_err(|e| DwellError::internal(format!("Failed to join task: {}", e)))?
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run_blocking(key, |file| file.load()).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.run_blocking(key, move |file| file.save(&value)).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.run_blocking(key, |file| file.remove()).await
    }
}
