//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! backends. Only persistence lives here; the messaging transport and
//! the import prompt are supplied by the embedding application.
//!
//! Adapter categories:
//! - `persistence`: in-memory and JSON-file key-value stores, snapshot files

pub mod persistence;
