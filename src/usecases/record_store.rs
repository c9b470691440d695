//! Record Store - Keyed History and Memo Groups
//!
//! Owns every read/write/merge/export/import over the mapping from group
//! key to record group, layered on the `KeyValueStore` port:
//! - `append` is a read-modify-write of one key
//! - retention cap and running minimum are enforced on every append
//! - imports are validated before any mutation
//! - storage errors propagate unchanged; nothing here retries
//!
//! Appends, updates and removals of the same key are serialized through
//! one async mutex per key unless `serialize_appends` is off, in which
//! case overlapping appends race and the last write wins. `clear` and
//! replace imports take no per-key lock: an append in flight when the
//! store is cleared writes its group back afterwards.
//!
//! Retention caps price histories only; groups holding memos are never
//! trimmed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::config::StoreConfig;
use crate::domain::entry::{Entry, GroupKey};
use crate::domain::error::StoreError;
use crate::domain::group::{GroupMeta, RecordGroup, Retention};
use crate::domain::legacy::{self, Layout, ENVELOPE_KEY};
use crate::domain::snapshot::{ImportMode, Snapshot};
use crate::ports::kv_store::{KeyValueStore, StoredItems};

/// Behaviour knobs for a record store.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// Length bound for price histories. Memo groups stay unbounded.
  pub retention: Retention,
  /// Serialize read-modify-write operations per key.
  pub serialize_appends: bool,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      retention: Retention::Unbounded,
      serialize_appends: true,
    }
  }
}

impl From<&StoreConfig> for StoreOptions {
  fn from(config: &StoreConfig) -> Self {
    Self {
      retention: Retention::from_cap(config.retention_cap),
      serialize_appends: config.serialize_appends,
    }
  }
}

/// Outcome of an import, for logging and user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
  /// How the snapshot was applied.
  pub mode: ImportMode,
  /// Groups written to the store.
  pub groups: usize,
  /// Entries held by the written groups.
  pub entries: usize,
}

/// Keyed record groups over an external key-value store.
pub struct RecordStore<S: KeyValueStore> {
  /// Backing key-value port.
  kv: Arc<S>,
  /// Retention and serialization settings.
  options: StoreOptions,
  /// One mutation lock per group key.
  key_locks: KeyLocks,
}

impl<S: KeyValueStore> RecordStore<S> {
  /// Create a record store over `kv`.
  pub fn new(kv: Arc<S>, options: StoreOptions) -> Self {
    Self {
      kv,
      options,
      key_locks: StdMutex::new(HashMap::new()),
    }
  }

  /// Active retention/serialization settings.
  pub const fn options(&self) -> StoreOptions {
    self.options
  }

  /// Group for `key`, sorted by timestamp. Absent keys yield an empty group.
  #[instrument(skip(self))]
  pub async fn get(&self, key: &str) -> Result<RecordGroup, StoreError> {
    let mut group = self.load(key).await?.unwrap_or_default();
    group.sort_chronological();
    Ok(group)
  }

  /// Append one entry to `key`'s group and persist the whole group.
  #[instrument(skip(self, entry), fields(timestamp = %entry.timestamp))]
  pub async fn append(&self, key: &str, entry: Entry) -> Result<RecordGroup, StoreError> {
    self.append_observed(key, entry, &GroupMeta::default()).await
  }

  /// Append one entry and refresh descriptive metadata in the same write.
  ///
  /// Title/channel/url from `meta` overwrite the stored ones when present.
  /// `meta.lowest` is ignored; the running minimum only follows entries.
  pub async fn append_observed(
    &self,
    key: &str,
    entry: Entry,
    meta: &GroupMeta,
  ) -> Result<RecordGroup, StoreError> {
    let _guard = self.key_guard(key).await;

    let mut group = self.load(key).await?.unwrap_or_default();
    group.meta.refresh_from(meta);
    group.push(entry, Retention::Unbounded);
    group.apply_retention(self.retention_for(&group));
    self.persist(key, &group).await?;

    debug!(
      key = %key,
      entries = group.len(),
      lowest = ?group.lowest(),
      "Entry appended"
    );
    Ok(group)
  }

  /// Serialized read-modify-write of one group.
  ///
  /// `apply` returns whether it changed anything; unchanged groups are
  /// not written back.
  pub async fn update<F>(&self, key: &str, apply: F) -> Result<RecordGroup, StoreError>
  where
    F: FnOnce(&mut RecordGroup) -> Result<bool, StoreError> + Send,
  {
    let _guard = self.key_guard(key).await;

    let mut group = self.load(key).await?.unwrap_or_default();
    if apply(&mut group)? {
      group.apply_retention(self.retention_for(&group));
      self.persist(key, &group).await?;
      debug!(key = %key, entries = group.len(), "Group updated");
    }
    Ok(group)
  }

  /// Overwrite `key`'s group wholesale.
  pub async fn put(&self, key: &str, group: RecordGroup) -> Result<(), StoreError> {
    let _guard = self.key_guard(key).await;
    self.persist(key, &group).await
  }

  /// Delete `key`'s group. Missing keys are not an error.
  ///
  /// Waits for in-flight appends to the same key, so a removal is never
  /// undone by an append that loaded the group earlier.
  #[instrument(skip(self))]
  pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
    let _guard = self.key_guard(key).await;
    self.kv.remove(&[key.to_string()]).await?;
    info!(key = %key, "Group removed");
    Ok(())
  }

  /// Delete every group.
  ///
  /// Takes no per-key locks; appends in flight may re-create their group.
  #[instrument(skip(self))]
  pub async fn clear(&self) -> Result<(), StoreError> {
    self.kv.clear().await?;
    info!("Store cleared");
    Ok(())
  }

  /// Every decodable, non-empty group, sorted, in key order.
  ///
  /// Values in no known layout (foreign keys, an unmigrated
  /// `priceHistory` envelope) are skipped with a warning.
  pub async fn list(&self) -> Result<Vec<(GroupKey, RecordGroup)>, StoreError> {
    Ok(
      self
        .decoded_groups()
        .await?
        .into_iter()
        .filter(|(_, group)| !group.is_empty())
        .collect(),
    )
  }

  /// Snapshot of the entire store.
  #[instrument(skip(self))]
  pub async fn export_snapshot(&self) -> Result<Snapshot, StoreError> {
    let snapshot = Snapshot::new(self.decoded_groups().await?);
    info!(
      groups = snapshot.groups.len(),
      entries = snapshot.entry_count(),
      "Snapshot exported"
    );
    Ok(snapshot)
  }

  /// Validate a raw JSON payload, then import it.
  ///
  /// Structural problems are reported as `MalformedSnapshot` before the
  /// store is touched.
  pub async fn import_value(&self, payload: &Value, mode: ImportMode) -> Result<ImportReport, StoreError> {
    let snapshot = Snapshot::from_value(payload)?;
    self.import_snapshot(snapshot, mode).await
  }

  /// Apply a validated snapshot.
  ///
  /// `Replace` clears the store and writes every snapshot group in one
  /// `set`. `Merge` unions each snapshot group with the stored one; keys
  /// absent from the snapshot are left untouched. Neither mode is atomic
  /// against the backend: a storage failure mid-way leaves earlier writes.
  #[instrument(skip(self, snapshot), fields(version = %snapshot.version, groups = snapshot.groups.len()))]
  pub async fn import_snapshot(&self, snapshot: Snapshot, mode: ImportMode) -> Result<ImportReport, StoreError> {
    let mut report = ImportReport {
      mode,
      groups: 0,
      entries: 0,
    };

    match mode {
      ImportMode::Replace => {
        // Encode everything first so a bad group cannot leave an empty store.
        let mut items = StoredItems::new();
        for (key, group) in snapshot.groups {
          let retention = self.retention_for(&group);
          let group = group.into_replacement(retention);
          report.groups += 1;
          report.entries += group.len();
          items.insert(key, encode(&group)?);
        }

        self.kv.clear().await?;
        if !items.is_empty() {
          self.kv.set(items).await?;
        }
      }
      ImportMode::Merge => {
        for (key, incoming) in snapshot.groups {
          let _guard = self.key_guard(&key).await;

          let existing = self.load(&key).await?.unwrap_or_default();
          let mut merged = existing.merge(&incoming);
          merged.apply_retention(self.retention_for(&merged));
          self.persist(&key, &merged).await?;

          report.groups += 1;
          report.entries += merged.len();
        }
      }
    }

    info!(
      mode = %report.mode,
      groups = report.groups,
      entries = report.entries,
      "Snapshot imported"
    );
    Ok(report)
  }

  /// Rewrite legacy-layout values in the current layout.
  ///
  /// Flat price histories and memo lists are re-encoded in place; the
  /// `priceHistory` envelope is split per product URL, merged into any
  /// existing groups, and then deleted. Returns the number of groups written.
  #[instrument(skip(self))]
  pub async fn migrate_legacy(&self) -> Result<usize, StoreError> {
    let all = self.kv.get_all().await?;
    let mut migrated = 0;

    for (key, value) in &all {
      if key == ENVELOPE_KEY {
        continue;
      }
      match legacy::classify(value) {
        Layout::FlatPrice | Layout::MemoList => {
          let group = legacy::decode_group(value)?;
          self.put(key, group).await?;
          migrated += 1;
        }
        Layout::Current | Layout::Unknown => {}
      }
    }

    if let Some(envelope) = all.get(ENVELOPE_KEY) {
      for (key, incoming) in legacy::split_enveloped(envelope)? {
        self
          .update(&key, |group| {
            *group = group.merge(&incoming);
            Ok(true)
          })
          .await?;
        migrated += 1;
      }
      self.kv.remove(&[ENVELOPE_KEY.to_string()]).await?;
    }

    info!(migrated, "Legacy layouts migrated");
    Ok(migrated)
  }

  /// Check backend health.
  pub async fn is_healthy(&self) -> bool {
    self.kv.is_healthy().await
  }

  /// Load and decode one key. `None` if absent.
  async fn load(&self, key: &str) -> Result<Option<RecordGroup>, StoreError> {
    let mut items = self.kv.get(&[key.to_string()]).await?;
    match items.remove(key) {
      None | Some(Value::Null) => Ok(None),
      Some(value) => legacy::decode_group(&value).map(Some).map_err(|e| {
        warn!(key = %key, error = %e, "Stored group is undecodable");
        e
      }),
    }
  }

  async fn persist(&self, key: &str, group: &RecordGroup) -> Result<(), StoreError> {
    let items = StoredItems::from([(key.to_string(), encode(group)?)]);
    self.kv.set(items).await?;
    Ok(())
  }

  async fn decoded_groups(&self) -> Result<BTreeMap<GroupKey, RecordGroup>, StoreError> {
    let all = self.kv.get_all().await?;
    let mut groups = BTreeMap::new();

    for (key, value) in all {
      match legacy::decode_group(&value) {
        Ok(mut group) => {
          group.sort_chronological();
          groups.insert(key, group);
        }
        Err(e) => warn!(key = %key, error = %e, "Skipping value that is not a record group"),
      }
    }
    Ok(groups)
  }

  /// Cap that applies to `group`.
  fn retention_for(&self, group: &RecordGroup) -> Retention {
    if group.holds_memos() {
      Retention::Unbounded
    } else {
      self.options.retention
    }
  }

  /// Acquire the per-key mutation lock when serialization is enabled.
  async fn key_guard(&self, key: &str) -> Option<KeyGuard<'_>> {
    if !self.options.serialize_appends {
      return None;
    }

    let lock = {
      let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(locks.entry(key.to_string()).or_default())
    };
    Some(KeyGuard {
      locks: &self.key_locks,
      key: key.to_string(),
      guard: Some(lock.lock_owned().await),
    })
  }

  #[cfg(test)]
  fn lock_slots(&self) -> usize {
    self.key_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

type KeyLocks = StdMutex<HashMap<GroupKey, Arc<Mutex<()>>>>;

/// Held per-key lock. Frees the key's slot when nobody else holds or
/// awaits it.
struct KeyGuard<'a> {
  locks: &'a KeyLocks,
  key: String,
  guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
  fn drop(&mut self) {
    drop(self.guard.take());

    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
      locks.remove(&self.key);
    }
  }
}

fn encode(group: &RecordGroup) -> Result<Value, StoreError> {
  serde_json::to_value(group)
    .map_err(|e| StoreError::InvalidInput(format!("record group is not serializable: {e}")))
}
