//! Persistence Adapters - Key-Value Backends and Snapshot Files
//!
//! Implements the `KeyValueStore` port in memory (tests, race
//! reproduction) and over a single JSON file with atomic rewrites.
//! No database dependency — lightweight and crash-recoverable.

pub mod json_file;
pub mod memory;
pub mod snapshot_file;

pub use json_file::JsonFileKvStore;
pub use memory::MemoryKvStore;
