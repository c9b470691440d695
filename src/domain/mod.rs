//! Domain layer - Core record model.
//!
//! Entries, record groups, snapshots and the legacy layouts they are
//! decoded from. No I/O here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod entry;
pub mod error;
pub mod group;
pub mod legacy;
pub mod price;
pub mod snapshot;

// Re-export core types for convenience
pub use entry::{Entry, EntryIdentity, EntryValue, GroupKey};
pub use error::{StorageError, StoreError};
pub use group::{GroupMeta, RecordGroup, Retention};
pub use snapshot::{ImportMode, Snapshot};
