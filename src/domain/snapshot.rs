//! Snapshot — portable export of the whole store.
//!
//! Wire format (pretty-printed UTF-8 JSON):
//! `{ "version": "2.0", "exportedAt": ISO-8601, "groups": { key: group } }`.
//! v1 memo exports (`exportDate` + `memos`) are accepted on import.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::GroupKey;
use super::error::StoreError;
use super::group::RecordGroup;
use super::legacy;

/// Format version written by `Snapshot::new`.
pub const SNAPSHOT_VERSION: &str = "2.0";

/// How an import treats the groups already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Union with existing groups, de-duplicated.
    Merge,
    /// Clear the store, then write the snapshot's groups.
    Replace,
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

impl std::str::FromStr for ImportMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "merge" => Ok(Self::Merge),
            "r" | "replace" => Ok(Self::Replace),
            other => Err(StoreError::InvalidInput(format!(
                "unknown import mode {other:?} (expected merge or replace)"
            ))),
        }
    }
}

/// Full-store export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version marker.
    pub version: String,
    /// When the export was taken.
    pub exported_at: DateTime<Utc>,
    /// Every group in the store, keyed by group key.
    pub groups: BTreeMap<GroupKey, RecordGroup>,
}

impl Snapshot {
    /// Snapshot of `groups` stamped with the current format version and time.
    pub fn new(groups: BTreeMap<GroupKey, RecordGroup>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            exported_at: Utc::now(),
            groups,
        }
    }

    /// Validate and decode an untrusted JSON value.
    ///
    /// Fails with `MalformedSnapshot` when the version marker or the group
    /// container is missing, or when any group fails to decode. Nothing is
    /// partially accepted.
    pub fn from_value(value: &Value) -> Result<Self, StoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::malformed("snapshot must be a JSON object"))?;

        let version = obj
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::malformed("missing version marker"))?;

        let container = obj
            .get("groups")
            .or_else(|| obj.get("memos"))
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::malformed("missing group container"))?;

        let exported_at = match obj.get("exportedAt").or_else(|| obj.get("exportDate")) {
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
                .map_err(|e| StoreError::malformed(format!("bad export time {raw:?}: {e}")))?
                .with_timezone(&Utc),
            Some(_) => return Err(StoreError::malformed("export time must be a string")),
            None => DateTime::<Utc>::default(),
        };

        let groups = container
            .iter()
            .map(|(key, group)| {
                legacy::decode_group(group)
                    .map(|group| (key.clone(), group))
                    .map_err(|e| StoreError::malformed(format!("group {key:?}: {e}")))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            version: version.to_string(),
            exported_at,
            groups,
        })
    }

    /// Parse and validate snapshot text.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StoreError::malformed(format!("not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Pretty-printed JSON for export files.
    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::InvalidInput(format!("snapshot is not serializable: {e}")))
    }

    /// Export file name: `<subject>-<ISO time with colons and dots stripped>.json`.
    pub fn file_name(&self, subject: &str) -> String {
        let stamp: String = self
            .exported_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .chars()
            .filter(|c| *c != ':' && *c != '.')
            .collect();
        format!("{subject}-{stamp}.json")
    }

    /// Total number of entries across all groups.
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(RecordGroup::len).sum()
    }
}
