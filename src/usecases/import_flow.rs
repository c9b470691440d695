//! Import/Export Flow - Snapshot Files In and Out of the Store
//!
//! Import: read file → validate → ask merge or replace → apply.
//! A file that fails validation never reaches the prompt, and a
//! cancelled prompt leaves the store untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::adapters::persistence::snapshot_file::{read_snapshot, write_snapshot};
use crate::domain::error::StoreError;
use crate::ports::kv_store::KeyValueStore;
use crate::ports::prompt::{ImportPrompt, ImportSummary};
use crate::usecases::record_store::{ImportReport, RecordStore};

/// File-level import/export over a record store.
pub struct ImportFlow<S: KeyValueStore, P: ImportPrompt> {
  store: Arc<RecordStore<S>>,
  prompt: P,
}

impl<S: KeyValueStore, P: ImportPrompt> ImportFlow<S, P> {
  /// Create a flow that asks `prompt` before every import.
  pub fn new(store: Arc<RecordStore<S>>, prompt: P) -> Self {
    Self { store, prompt }
  }

  /// Import a snapshot file. `Ok(None)` when the user cancelled.
  #[instrument(skip(self))]
  pub async fn import_file(&self, path: &Path) -> Result<Option<ImportReport>, StoreError> {
    let snapshot = read_snapshot(path).await?;
    let summary = ImportSummary::of(&snapshot);

    let Some(mode) = self.prompt.choose_mode(&summary).await else {
      info!(path = %path.display(), "Import cancelled");
      return Ok(None);
    };

    let report = self.store.import_snapshot(snapshot, mode).await?;
    Ok(Some(report))
  }

  /// Export the whole store to `<dir>/<subject>-<time>.json`.
  #[instrument(skip(self))]
  pub async fn export_file(&self, dir: &Path, subject: &str) -> Result<PathBuf, StoreError> {
    let snapshot = self.store.export_snapshot().await?;
    write_snapshot(dir, subject, &snapshot).await
  }
}
