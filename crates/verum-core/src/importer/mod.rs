//! # Transactional Importer
//!
//! Federates a subgraph into a store that assigns its own identifiers.
//!
//! ## Two phases, two transactions
//!
//! 1. **Nodes**: one `MergeNode` upsert per node, keyed by (class, key, value),
//!    committed as T1. The commit returns the stored nodes; their properties
//!    are turned back into node URIs to build `uri -> StoreId`.
//! 2. **Edges**: one `CreateEdge` per edge between the ids learned in phase 1,
//!    committed as T2. T2 is not built until T1's commit has returned.
//!
//! Each phase is validated before its transaction is sent, and each commit is
//! all-or-nothing. A committed node phase is kept when the edge phase fails.
//! Edges are never deduplicated against what the store already holds.

mod statement;

pub use statement::{CommitResult, Statement, StoredNode, Transaction};

use crate::identity::node_uri;
use crate::primitives::{
    CLASS_ATTR, KEY_ATTR, MAX_TRANSACTION_STATEMENTS, RELATIONSHIP_ATTR, VALUE_ATTR,
};
use crate::{ImportPhase, Node, StoreId, Subgraph, VerumError};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Node URI to the id the store assigned it.
pub type NodeMap = BTreeMap<String, StoreId>;

/// A store that executes a transaction of statements atomically.
pub trait TransactionalStore {
    /// Execute every statement or none of them.
    fn commit(&mut self, transaction: Transaction) -> Result<CommitResult, VerumError>;
}

impl<S: TransactionalStore + ?Sized> TransactionalStore for &mut S {
    fn commit(&mut self, transaction: Transaction) -> Result<CommitResult, VerumError> {
        (**self).commit(transaction)
    }
}

/// What an import wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Node URIs mapped to store ids by the node phase.
    pub node_map: NodeMap,
    /// Relationships created by the edge phase.
    pub edges_created: usize,
}

/// Imports subgraphs into a [`TransactionalStore`].
#[derive(Debug)]
pub struct Importer<S> {
    store: S,
}

impl<S: TransactionalStore> Importer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Import a whole subgraph: the node phase, then the edge phase.
    pub fn import(&mut self, subgraph: &Subgraph) -> Result<ImportReport, VerumError> {
        let node_map = self.import_nodes(subgraph.nodes())?;
        let edges_created = self.import_edges(subgraph, &node_map)?;
        info!(
            nodes = node_map.len(),
            edges = edges_created,
            "import complete"
        );
        Ok(ImportReport {
            node_map,
            edges_created,
        })
    }

    /// Phase 1: upsert every node in one transaction.
    pub fn import_nodes(&mut self, nodes: &[Node]) -> Result<NodeMap, VerumError> {
        let phase = ImportPhase::Nodes;
        if nodes.is_empty() {
            return Ok(NodeMap::new());
        }
        check_size(phase, nodes.len())?;

        let mut transaction = Transaction::new();
        for node in nodes {
            transaction.push(merge_statement(node)?);
        }

        debug!(statements = transaction.len(), "committing node phase");
        let result = self
            .store
            .commit(transaction)
            .map_err(|e| failed(phase, e))?;

        let mut node_map = NodeMap::new();
        for stored in result.nodes {
            let field = |name: &str| stored.properties.get(name).map(String::as_str);
            match (field(CLASS_ATTR), field(KEY_ATTR), field(VALUE_ATTR)) {
                (Some(class), Some(key), Some(value)) => {
                    node_map.insert(node_uri(class, key, value), stored.id);
                }
                _ => warn!(id = %stored.id, "stored node without identity properties, not mapped"),
            }
        }
        debug!(mapped = node_map.len(), "node phase committed");
        Ok(node_map)
    }

    /// Phase 2: create every edge in one transaction, between ids from
    /// `node_map`.
    ///
    /// Returns the number of relationships the store reports created.
    pub fn import_edges(
        &mut self,
        subgraph: &Subgraph,
        node_map: &NodeMap,
    ) -> Result<usize, VerumError> {
        let phase = ImportPhase::Edges;
        if subgraph.edges().is_empty() {
            return Ok(0);
        }
        check_size(phase, subgraph.edge_count())?;

        let labels: BTreeMap<&str, &str> = subgraph
            .nodes()
            .iter()
            .filter_map(|n| n.class().map(|class| (n.uri.as_str(), class)))
            .collect();
        let endpoint = |uri: &str| -> Result<(StoreId, String), VerumError> {
            let id = node_map.get(uri).copied().ok_or_else(|| {
                VerumError::InvalidEdge(format!("no store id for endpoint '{uri}'"))
            })?;
            let label = labels.get(uri).copied().ok_or_else(|| {
                VerumError::InvalidEdge(format!("endpoint '{uri}' has no class"))
            })?;
            Ok((id, label.to_string()))
        };

        let mut transaction = Transaction::new();
        for edge in subgraph.edges() {
            let (source_id, source_label) =
                endpoint(&edge.source).map_err(|e| failed(phase, e))?;
            let (target_id, target_label) =
                endpoint(&edge.target).map_err(|e| failed(phase, e))?;
            let mut properties = edge.attributes.clone();
            properties.remove(RELATIONSHIP_ATTR);
            transaction.push(Statement::CreateEdge {
                source_label,
                target_label,
                source_id,
                target_id,
                relationship: edge.relationship().to_string(),
                properties,
            });
        }

        debug!(statements = transaction.len(), "committing edge phase");
        let result = self
            .store
            .commit(transaction)
            .map_err(|e| failed(phase, e))?;
        Ok(result.relationships_created)
    }
}

/// Upsert statement for one node; rejects nodes missing an identity field.
fn merge_statement(node: &Node) -> Result<Statement, VerumError> {
    let field = |name: &str| {
        node.get(name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| VerumError::ImportFailed {
                phase: ImportPhase::Nodes,
                reason: format!("node '{}' has no '{name}'", node.uri),
            })
    };
    Ok(Statement::MergeNode {
        label: field(CLASS_ATTR)?,
        key: field(KEY_ATTR)?,
        value: field(VALUE_ATTR)?,
        properties: node.attributes.clone(),
    })
}

fn check_size(phase: ImportPhase, statements: usize) -> Result<(), VerumError> {
    if statements > MAX_TRANSACTION_STATEMENTS {
        return Err(VerumError::ImportFailed {
            phase,
            reason: format!(
                "{statements} statements exceed the limit of {MAX_TRANSACTION_STATEMENTS}"
            ),
        });
    }
    Ok(())
}

fn failed(phase: ImportPhase, error: VerumError) -> VerumError {
    match error {
        VerumError::ImportFailed { .. } => error,
        other => VerumError::ImportFailed {
            phase,
            reason: other.to_string(),
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Edge;
    use chrono::Utc;

    /// Accepts every transaction, numbering nodes in commit order.
    #[derive(Default)]
    struct CountingStore {
        commits: Vec<Transaction>,
    }

    impl TransactionalStore for CountingStore {
        fn commit(&mut self, transaction: Transaction) -> Result<CommitResult, VerumError> {
            let mut result = CommitResult::default();
            for (i, statement) in transaction.statements().iter().enumerate() {
                match statement {
                    Statement::MergeNode { properties, .. } => result.nodes.push(StoredNode {
                        id: StoreId(100 + i as u64),
                        properties: properties.clone(),
                    }),
                    Statement::CreateEdge { .. } => result.relationships_created += 1,
                }
            }
            self.commits.push(transaction);
            Ok(result)
        }
    }

    fn pair() -> Subgraph {
        let now = Utc::now();
        let a = Node::new("attribute", "domain", "example.com", now);
        let b = Node::new("attribute", "ip", "10.0.0.1", now);
        let mut subgraph = Subgraph::new();
        subgraph.add_edge(Edge::described_by(&a, &b, "dns", now));
        subgraph.add_node(a);
        subgraph.add_node(b);
        subgraph
    }

    #[test]
    fn edge_properties_exclude_relationship() {
        let mut importer = Importer::new(CountingStore::default());
        importer.import(&pair()).expect("import");

        let store = importer.into_store();
        let edge = store.commits[1].statements().iter().find_map(|s| match s {
            Statement::CreateEdge {
                relationship,
                properties,
                source_label,
                ..
            } => Some((relationship, properties, source_label)),
            Statement::MergeNode { .. } => None,
        });
        let (relationship, properties, source_label) = edge.expect("edge statement");
        assert_eq!(relationship, "describedBy");
        assert_eq!(source_label, "attribute");
        assert!(!properties.contains_key("relationship"));
        assert_eq!(properties.get("origin").map(String::as_str), Some("dns"));
    }

    #[test]
    fn empty_subgraph_commits_nothing() {
        let mut importer = Importer::new(CountingStore::default());
        let report = importer.import(&Subgraph::new()).expect("import");
        assert!(report.node_map.is_empty());
        assert!(importer.store().commits.is_empty());
    }

    #[test]
    fn nodes_without_edges_commit_once() {
        let mut subgraph = Subgraph::new();
        subgraph.add_node(Node::new("attribute", "domain", "example.com", Utc::now()));

        let mut importer = Importer::new(CountingStore::default());
        importer.import(&subgraph).expect("import");
        assert_eq!(importer.store().commits.len(), 1);
    }

    #[test]
    fn bare_node_aborts_node_phase_before_commit() {
        let mut subgraph = pair();
        subgraph.add_node(Node::bare("orphan"));

        let mut importer = Importer::new(CountingStore::default());
        let err = importer.import(&subgraph).expect_err("must fail");
        assert!(matches!(
            err,
            VerumError::ImportFailed {
                phase: ImportPhase::Nodes,
                ..
            }
        ));
        assert!(importer.store().commits.is_empty());
    }

    #[test]
    fn wrapped_store_errors_name_the_phase() {
        let err = failed(ImportPhase::Edges, VerumError::StoreError("down".to_string()));
        assert_eq!(
            err.to_string(),
            "Import failed in edge phase: Store error: down"
        );
    }
}
