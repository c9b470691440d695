//! In-Memory Store - Process-local Key-Value Backend
//!
//! Implements the `KeyValueStore` port over a `BTreeMap`. An optional
//! artificial latency is applied before every operation, which lets
//! overlapping read-modify-write calls interleave the way they do
//! against a real asynchronous backend.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::StorageError;
use crate::ports::kv_store::{KeyValueStore, StoredItems};

/// Key-value store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    /// Current contents.
    items: RwLock<StoredItems>,
    /// Delay applied before each operation touches the map.
    latency: Option<Duration>,
}

impl MemoryKvStore {
    /// Create an empty store with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `items`.
    pub fn with_items(items: StoredItems) -> Self {
        Self {
            items: RwLock::new(items),
            latency: None,
        }
    }

    /// Delay every operation by `latency` before it reads or writes.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Copy of the full contents, bypassing latency.
    pub async fn dump(&self) -> StoredItems {
        self.items.read().await.clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, keys: &[String]) -> Result<StoredItems, StorageError> {
        self.pause().await;
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn get_all(&self) -> Result<StoredItems, StorageError> {
        self.pause().await;
        Ok(self.items.read().await.clone())
    }

    async fn set(&self, items: StoredItems) -> Result<(), StorageError> {
        self.pause().await;
        self.items.write().await.extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        self.pause().await;
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.pause().await;
        self.items.write().await.clear();
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
