//! JSON File Store - Atomic Whole-map Persistence
//!
//! Implements the `KeyValueStore` port over a single JSON object file.
//! Writes go to a temporary file first and are then renamed over the
//! real one, so the file is always either the old or the new version.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::StorageError;
use crate::ports::kv_store::{KeyValueStore, StoredItems};

/// Key-value store persisted as one pretty-printed JSON object.
pub struct JsonFileKvStore {
    /// Path to the store file.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
    /// Serializes file rewrites within this process.
    write_lock: Mutex<()>,
}

impl JsonFileKvStore {
    /// Open (or prepare to create) the store file at `path`.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        info!(path = %path.display(), "JSON file store opened");
        Ok(Self {
            path,
            tmp_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file. A missing file is an empty store.
    async fn load(&self) -> Result<StoredItems, StorageError> {
        if !fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "No store file yet, starting empty");
            return Ok(StoredItems::new());
        }

        let json = fs::read_to_string(&self.path).await?;
        if json.trim().is_empty() {
            return Ok(StoredItems::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Write the whole map atomically (tmp → rename).
    #[instrument(skip(self, items), fields(keys = items.len()))]
    async fn persist(&self, items: &StoredItems) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(items)?;

        fs::write(&self.tmp_path, &json).await?;
        fs::rename(&self.tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), "Store file written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileKvStore {
    async fn get(&self, keys: &[String]) -> Result<StoredItems, StorageError> {
        let mut all = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove_entry(key))
            .collect())
    }

    async fn get_all(&self) -> Result<StoredItems, StorageError> {
        self.load().await
    }

    async fn set(&self, items: StoredItems) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await?;
        all.extend(items);
        self.persist(&all).await
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await?;
        let before = all.len();
        for key in keys {
            all.remove(key);
        }
        if all.len() == before {
            return Ok(());
        }
        self.persist(&all).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.persist(&StoredItems::new()).await
    }

    async fn is_healthy(&self) -> bool {
        match self.load().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Store file unreadable");
                false
            }
        }
    }
}
