//! # Context Graph
//!
//! The in-memory master graph: a directed multigraph keyed by node URI.
//!
//! Nodes are deduplicated by URI and merged attribute by attribute.
//! Edges are appended and never deduplicated; several edges between the same
//! ordered pair of nodes are expected and carry history.
//! Node storage uses `BTreeMap` for deterministic ordering.

use crate::{Edge, Node, Subgraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// MERGE POLICY
// =============================================================================

/// How an incoming node's attributes are applied to an existing node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Incoming attributes always overwrite, key by key.
    #[default]
    LastWriteWins,
    /// Incoming attributes overwrite only when the incoming `start_time` is not
    /// older than the stored one. Nodes without a readable `start_time` on
    /// either side are overwritten.
    NewerStartTime,
}

/// Counts of what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub nodes_added: usize,
    pub nodes_updated: usize,
    pub edges_added: usize,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The master context graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextGraph {
    /// Node storage: uri -> Node
    nodes: BTreeMap<String, Node>,

    /// Edge storage in insertion order.
    edges: Vec<Edge>,
}

impl ContextGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all nodes in URI order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node by URI.
    #[must_use]
    pub fn node(&self, uri: &str) -> Option<&Node> {
        self.nodes.get(uri)
    }

    #[must_use]
    pub fn contains_node(&self, uri: &str) -> bool {
        self.nodes.contains_key(uri)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// All edges from `source` to `target`, in insertion order.
    pub fn edges_between<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == source && e.target == target)
    }

    /// Insert a node, or merge its attributes into the node with the same URI.
    ///
    /// Returns `true` if the node was new.
    pub fn upsert_node(&mut self, node: Node, policy: MergePolicy) -> bool {
        match self.nodes.get_mut(&node.uri) {
            Some(existing) => {
                let overwrite = match policy {
                    MergePolicy::LastWriteWins => true,
                    MergePolicy::NewerStartTime => {
                        match (existing.start_time(), node.start_time()) {
                            (Some(stored), Some(incoming)) => incoming >= stored,
                            _ => true,
                        }
                    }
                };
                if overwrite {
                    existing.attributes.extend(node.attributes);
                }
                false
            }
            None => {
                self.nodes.insert(node.uri.clone(), node);
                true
            }
        }
    }

    /// Append an edge. Endpoints the graph has never seen are added as bare
    /// nodes carrying only their URI.
    pub fn add_edge(&mut self, edge: Edge) {
        for uri in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(uri.as_str()) {
                self.nodes.insert(uri.clone(), Node::bare(uri.clone()));
            }
        }
        self.edges.push(edge);
    }

    /// Merge a subgraph: nodes are upserted, edges are always appended.
    pub fn merge(&mut self, subgraph: &Subgraph, policy: MergePolicy) -> MergeStats {
        let mut stats = MergeStats::default();

        for node in subgraph.nodes() {
            if self.upsert_node(node.clone(), policy) {
                stats.nodes_added += 1;
            } else {
                stats.nodes_updated += 1;
            }
        }

        for edge in subgraph.edges() {
            self.add_edge(edge.clone());
            stats.edges_added += 1;
        }

        stats
    }
}

impl From<&ContextGraph> for Subgraph {
    fn from(graph: &ContextGraph) -> Self {
        let mut subgraph = Subgraph::new();
        for node in graph.nodes() {
            subgraph.add_node(node.clone());
        }
        for edge in graph.edges() {
            subgraph.add_edge(edge.clone());
        }
        subgraph
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the graph for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl From<&ContextGraph> for SerializableGraph {
    fn from(graph: &ContextGraph) -> Self {
        Self {
            nodes: graph.nodes.values().cloned().collect(),
            edges: graph.edges.clone(),
        }
    }
}

impl From<SerializableGraph> for ContextGraph {
    fn from(sg: SerializableGraph) -> Self {
        let mut graph = ContextGraph::new();
        for node in sg.nodes {
            graph.nodes.insert(node.uri.clone(), node);
        }
        for edge in sg.edges {
            graph.add_edge(edge);
        }
        graph
    }
}

// =============================================================================
// TESTS
// =============================================================================
