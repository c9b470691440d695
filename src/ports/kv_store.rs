//! Key-Value Store Port - External Persistent Storage Interface
//!
//! The host key-value store the record store sits on. Values are
//! arbitrary JSON; there are no multi-key transactions, so every
//! read-modify-write above this port is a potential race.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::StorageError;

/// Mapping of store keys to JSON values, as read from or written to the store.
pub type StoredItems = BTreeMap<String, Value>;

/// Trait for the external async key-value store.
///
/// Every operation may fail with a generic `StorageError`. Absent keys
/// are simply missing from the returned mapping.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
  /// Read the given keys. Keys that do not exist are omitted.
  async fn get(&self, keys: &[String]) -> Result<StoredItems, StorageError>;

  /// Read every key in the store.
  async fn get_all(&self) -> Result<StoredItems, StorageError>;

  /// Write every key in `items`, overwriting previous values.
  async fn set(&self, items: StoredItems) -> Result<(), StorageError>;

  /// Delete the given keys. Missing keys are not an error.
  async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;

  /// Delete everything.
  async fn clear(&self) -> Result<(), StorageError>;

  /// Check if the backend is reachable and writable.
  async fn is_healthy(&self) -> bool;
}
