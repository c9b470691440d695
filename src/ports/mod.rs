//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `KeyValueStore`: the external asynchronous key-value store
//! - `MessageChannel`: request/response between extension contexts
//! - `ImportPrompt`: user choice between merge and replace

pub mod kv_store;
pub mod messaging;
pub mod prompt;
