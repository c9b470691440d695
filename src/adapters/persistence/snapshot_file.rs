//! Snapshot Files - Export/Import File I/O
//!
//! Writes snapshots as pretty-printed JSON named
//! `<subject>-<ISO time>.json` and reads user-selected files back.
//! Parse failures surface as `MalformedSnapshot`, I/O failures as
//! `StorageError`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument};

use crate::domain::error::{StorageError, StoreError};
use crate::domain::snapshot::Snapshot;

/// Write `snapshot` into `dir` using the export naming convention.
///
/// Written to a temporary file and renamed, like the store file.
#[instrument(skip(snapshot), fields(groups = snapshot.groups.len()))]
pub async fn write_snapshot(
    dir: &Path,
    subject: &str,
    snapshot: &Snapshot,
) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dir).await.map_err(StorageError::from)?;

    let path = dir.join(snapshot.file_name(subject));
    let tmp_path = path.with_extension("json.tmp");
    let json = snapshot.to_json_pretty()?;

    fs::write(&tmp_path, json).await.map_err(StorageError::from)?;
    fs::rename(&tmp_path, &path).await.map_err(StorageError::from)?;

    info!(
        path = %path.display(),
        entries = snapshot.entry_count(),
        "Snapshot exported"
    );
    Ok(path)
}

/// Read and validate a snapshot file.
#[instrument]
pub async fn read_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
    let text = fs::read_to_string(path).await.map_err(StorageError::from)?;
    let snapshot = Snapshot::from_json(&text)?;

    info!(
        version = %snapshot.version,
        groups = snapshot.groups.len(),
        "Snapshot file read"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new(BTreeMap::new());

        let path = write_snapshot(dir.path(), "records", &snapshot).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("records-"));
        assert!(name.ends_with(".json"));
        assert!(!name.trim_end_matches(".json").contains('.'));

        let back = read_snapshot(&path).await.unwrap();
        assert_eq!(back, snapshot);
    }

    #[tokio::test]
    async fn test_read_garbage_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "[1, 2").await.unwrap();

        let err = read_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshot(_)));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_snapshot(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }
}
