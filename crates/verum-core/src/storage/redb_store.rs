//! # redb-backed Transactional Store
//!
//! An embedded graph store that executes importer transactions natively.
//!
//! - One redb write transaction per [`Transaction`]: every statement lands or
//!   none does (dropping an uncommitted write transaction aborts it)
//! - Node ids are assigned here, from a persisted counter, and never reused
//! - Nodes are indexed by their URI, so `MergeNode` finds existing nodes
//! - Edges are appended under their own counter; nothing is deduplicated

use crate::identity::node_uri;
use crate::importer::{CommitResult, Statement, StoredNode, Transaction, TransactionalStore};
use crate::{Attributes, StoreId, VerumError};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Table for nodes: StoreId(u64) -> serialized NodeRecord bytes
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Table for node lookup: node uri -> StoreId(u64)
const NODE_INDEX: TableDefinition<&str, u64> = TableDefinition::new("node_index");

/// Table for edges: edge id(u64) -> serialized StoredEdge bytes
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID: &str = "next_node_id";
const NEXT_EDGE_ID: &str = "next_edge_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    label: String,
    properties: Attributes,
}

/// A relationship as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEdge {
    pub source: StoreId,
    pub target: StoreId,
    pub relationship: String,
    pub properties: Attributes,
}

fn store_error(e: impl std::fmt::Display) -> VerumError {
    VerumError::StoreError(e.to_string())
}

/// A disk-backed transactional graph store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VerumError> {
        let db = Database::create(path.as_ref()).map_err(store_error)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(store_error)?;
            let _ = write_txn.open_table(NODES).map_err(store_error)?;
            let _ = write_txn.open_table(NODE_INDEX).map_err(store_error)?;
            let _ = write_txn.open_table(EDGES).map_err(store_error)?;
            let _ = write_txn.open_table(METADATA).map_err(store_error)?;
            write_txn.commit().map_err(store_error)?;
        }

        Ok(Self { db })
    }

    pub fn node_count(&self) -> Result<usize, VerumError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(NODES).map_err(store_error)?;
        Ok(table.len().map_err(store_error)? as usize)
    }

    pub fn edge_count(&self) -> Result<usize, VerumError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(EDGES).map_err(store_error)?;
        Ok(table.len().map_err(store_error)? as usize)
    }

    /// Id of the node with this URI, if stored.
    pub fn node_id(&self, uri: &str) -> Result<Option<StoreId>, VerumError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let index = read_txn.open_table(NODE_INDEX).map_err(store_error)?;
        Ok(index
            .get(uri)
            .map_err(store_error)?
            .map(|id| StoreId(id.value())))
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> Result<Vec<StoredNode>, VerumError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(NODES).map_err(store_error)?;

        let mut nodes = Vec::new();
        for entry in table.iter().map_err(store_error)? {
            let (key, value) = entry.map_err(store_error)?;
            let record: NodeRecord = postcard::from_bytes(value.value())
                .map_err(|e| VerumError::DeserializationError(e.to_string()))?;
            nodes.push(StoredNode {
                id: StoreId(key.value()),
                properties: record.properties,
            });
        }
        Ok(nodes)
    }

    /// All edges in creation order.
    pub fn edges(&self) -> Result<Vec<StoredEdge>, VerumError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(EDGES).map_err(store_error)?;

        let mut edges = Vec::new();
        for entry in table.iter().map_err(store_error)? {
            let (_, value) = entry.map_err(store_error)?;
            let edge: StoredEdge = postcard::from_bytes(value.value())
                .map_err(|e| VerumError::DeserializationError(e.to_string()))?;
            edges.push(edge);
        }
        Ok(edges)
    }

    /// Run every statement inside `write_txn`. The caller commits.
    fn apply(
        write_txn: &WriteTransaction,
        transaction: Transaction,
    ) -> Result<CommitResult, VerumError> {
        let mut nodes_table = write_txn.open_table(NODES).map_err(store_error)?;
        let mut index_table = write_txn.open_table(NODE_INDEX).map_err(store_error)?;
        let mut edges_table = write_txn.open_table(EDGES).map_err(store_error)?;
        let mut meta_table = write_txn.open_table(METADATA).map_err(store_error)?;

        let mut next_node_id = read_counter(&meta_table, NEXT_NODE_ID)?;
        let mut next_edge_id = read_counter(&meta_table, NEXT_EDGE_ID)?;

        let mut result = CommitResult::default();
        for statement in transaction {
            match statement {
                Statement::MergeNode {
                    label,
                    key,
                    value,
                    properties,
                } => {
                    let uri = node_uri(&label, &key, &value);
                    let existing = index_table
                        .get(uri.as_str())
                        .map_err(store_error)?
                        .map(|id| id.value());

                    let stored = match existing {
                        Some(id) => {
                            let record = nodes_table
                                .get(id)
                                .map_err(store_error)?
                                .map(|bytes| postcard::from_bytes::<NodeRecord>(bytes.value()))
                                .transpose()
                                .map_err(|e| VerumError::DeserializationError(e.to_string()))?
                                .ok_or_else(|| {
                                    store_error(format!("index points at missing node {id}"))
                                })?;
                            StoredNode {
                                id: StoreId(id),
                                properties: record.properties,
                            }
                        }
                        None => {
                            let id = next_node_id;
                            next_node_id = next_node_id.saturating_add(1);
                            let record = NodeRecord { label, properties };
                            let bytes = postcard::to_allocvec(&record)
                                .map_err(|e| VerumError::SerializationError(e.to_string()))?;
                            nodes_table
                                .insert(id, bytes.as_slice())
                                .map_err(store_error)?;
                            index_table
                                .insert(uri.as_str(), id)
                                .map_err(store_error)?;
                            StoredNode {
                                id: StoreId(id),
                                properties: record.properties,
                            }
                        }
                    };
                    result.nodes.push(stored);
                }
                Statement::CreateEdge {
                    source_label,
                    target_label,
                    source_id,
                    target_id,
                    relationship,
                    properties,
                } => {
                    for (id, label) in [(source_id, &source_label), (target_id, &target_label)] {
                        let record = nodes_table
                            .get(id.0)
                            .map_err(store_error)?
                            .map(|bytes| postcard::from_bytes::<NodeRecord>(bytes.value()))
                            .transpose()
                            .map_err(|e| VerumError::DeserializationError(e.to_string()))?;
                        match record {
                            Some(record) if &record.label == label => {}
                            _ => {
                                return Err(VerumError::InvalidEdge(format!(
                                    "no {label} node with id {id}"
                                )));
                            }
                        }
                    }

                    let edge = StoredEdge {
                        source: source_id,
                        target: target_id,
                        relationship,
                        properties,
                    };
                    let bytes = postcard::to_allocvec(&edge)
                        .map_err(|e| VerumError::SerializationError(e.to_string()))?;
                    edges_table
                        .insert(next_edge_id, bytes.as_slice())
                        .map_err(store_error)?;
                    next_edge_id = next_edge_id.saturating_add(1);
                    result.relationships_created += 1;
                }
            }
        }

        meta_table
            .insert(NEXT_NODE_ID, next_node_id)
            .map_err(store_error)?;
        meta_table
            .insert(NEXT_EDGE_ID, next_edge_id)
            .map_err(store_error)?;
        Ok(result)
    }
}

fn read_counter(
    table: &impl ReadableTable<&'static str, u64>,
    name: &str,
) -> Result<u64, VerumError> {
    Ok(table
        .get(name)
        .map_err(store_error)?
        .map(|v| v.value())
        .unwrap_or(0))
}

impl TransactionalStore for RedbStore {
    fn commit(&mut self, transaction: Transaction) -> Result<CommitResult, VerumError> {
        let statements = transaction.len();
        let write_txn = self.db.begin_write().map_err(store_error)?;
        // On error the transaction is dropped uncommitted, which aborts it.
        let result = Self::apply(&write_txn, transaction)?;
        write_txn.commit().map_err(store_error)?;
        debug!(
            statements,
            nodes = result.nodes.len(),
            relationships = result.relationships_created,
            "redb transaction committed"
        );
        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================
