//! Import Prompt Port - User Choice Between Merge and Replace
//!
//! After a snapshot passes structural validation, the user decides how
//! it is applied. Nothing is mutated until this port answers.

use async_trait::async_trait;

use crate::domain::snapshot::{ImportMode, Snapshot};

/// What the user is shown before choosing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
  /// Snapshot format version.
  pub version: String,
  /// Number of groups in the snapshot.
  pub groups: usize,
  /// Number of entries across all groups.
  pub entries: usize,
}

impl ImportSummary {
  /// Summarize a validated snapshot.
  pub fn of(snapshot: &Snapshot) -> Self {
    Self {
      version: snapshot.version.clone(),
      groups: snapshot.groups.len(),
      entries: snapshot.entry_count(),
    }
  }
}

/// Trait for asking the user how to apply an import.
#[async_trait]
pub trait ImportPrompt: Send + Sync {
  /// `None` cancels the import.
  async fn choose_mode(&self, summary: &ImportSummary) -> Option<ImportMode>;
}
