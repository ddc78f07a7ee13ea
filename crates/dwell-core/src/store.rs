//! Persistent store interface.
//!
//! Defines the key/value contract the tracker persists through, decoupling
//! the lifecycle engine from the storage mechanism (files, platform
//! key/value store, in-memory).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// Key-based storage for serialized records.
///
/// # Implementation Notes
///
/// - `get` on a missing key returns `Ok(None)`, not an error
/// - `remove` on a missing key succeeds
/// - `set` replaces the whole value
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// JSON helpers layered over any [`KeyValueStore`].
#[async_trait]
pub trait StoreExt: KeyValueStore {
    /// Loads and decodes a record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: record present and valid
    /// - `Ok(None)`: key absent
    /// - `Err(_)`: read failed or the stored value does not parse
    async fn load_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw).await
    }
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {}
