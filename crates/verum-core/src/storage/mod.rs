//! # Storage Module
//!
//! Embedded store backends for the transactional importer.

mod redb_store;

pub use redb_store::{RedbStore, StoredEdge};
