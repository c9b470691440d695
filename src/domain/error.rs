//! Error taxonomy for the record store.
//!
//! An absent key is never an error: reads of unknown keys yield an
//! empty group. Everything that can actually fail is listed here.

use thiserror::Error;

/// Failure reported by the external key-value store.
///
/// Propagated unchanged through `RecordStore`; the store never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage error: {message}")]
pub struct StorageError {
    message: String,
}

impl StorageError {
    /// Create a storage error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("stored data is not valid JSON: {err}"))
    }
}

/// Errors surfaced by store operations and the use cases built on them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Import payload (or a stored value) lacks a required structural field.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The key-value backend rejected an operation.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The scrape collaborator could not find its target; nothing was appended.
    #[error("scrape target missing: {0}")]
    ScrapeTargetMissing(String),

    /// The cross-context request could not be completed.
    #[error("message channel failed: {0}")]
    Channel(String),

    /// Caller supplied an unusable argument (blank memo, unknown memo id).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Shorthand for a `MalformedSnapshot` with a formatted reason.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot(reason.into())
    }
}
