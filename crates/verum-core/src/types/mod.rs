//! # Core Type Definitions
//!
//! This module contains the value types exchanged between components:
//! - Graph elements (`Node`, `Edge`, `Attributes`)
//! - The unit of exchange (`Subgraph`)
//! - Store identifiers (`StoreId`)
//! - Error types (`VerumError`, `ImportPhase`)
//!
//! ## Determinism Guarantees
//!
//! Attribute maps are `BTreeMap`s, so every format writes attributes in the
//! same order on every run. Node URIs are derived from content, never assigned.

use crate::identity::{edge_uri, node_uri};
use crate::primitives::{
    CLASS_ATTR, DEFAULT_RELATIONSHIP, KEY_ATTR, ORIGIN_ATTR, RELATIONSHIP_ATTR, START_TIME_ATTR,
    TIME_FORMAT, URI_ATTR, VALUE_ATTR,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// String attributes carried by nodes and edges.
pub type Attributes = BTreeMap<String, String>;

// =============================================================================
// STORE IDENTIFIERS
// =============================================================================

/// Opaque identifier an external store assigns to an entity it created.
///
/// Unknown until the store commits the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreId(pub u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A node of the context graph.
///
/// The `uri` is always `node_uri(class, key, value)` for nodes built through
/// the constructors, and is mirrored into the attribute map under `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Deterministic identity of the node.
    pub uri: String,
    /// All attributes, including `class`, `key`, `value` and `start_time`.
    pub attributes: Attributes,
}

impl Node {
    /// Create a node for `(class, key, value)` first seen at `start_time`.
    #[must_use]
    pub fn new(class: &str, key: &str, value: &str, start_time: DateTime<Utc>) -> Self {
        let uri = node_uri(class, key, value);
        let attributes = Attributes::from([
            (CLASS_ATTR.to_string(), class.to_string()),
            (KEY_ATTR.to_string(), key.to_string()),
            (VALUE_ATTR.to_string(), value.to_string()),
            (
                START_TIME_ATTR.to_string(),
                start_time.format(TIME_FORMAT).to_string(),
            ),
            (URI_ATTR.to_string(), uri.clone()),
        ]);
        Self { uri, attributes }
    }

    /// Rebuild a node from a full attribute map.
    ///
    /// The map must carry non-empty `class`, `key` and `value`; the URI is
    /// recomputed from them rather than trusted.
    pub fn from_attributes(mut attributes: Attributes) -> Result<Self, VerumError> {
        let uri = {
            let field = |name: &str| {
                attributes
                    .get(name)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| VerumError::InvalidNode(format!("missing '{name}'")))
            };
            node_uri(field(CLASS_ATTR)?, field(KEY_ATTR)?, field(VALUE_ATTR)?)
        };
        attributes.insert(URI_ATTR.to_string(), uri.clone());
        Ok(Self { uri, attributes })
    }

    /// A node known only by its URI, with no other attributes.
    ///
    /// Created when an edge references a node the graph has never seen.
    #[must_use]
    pub fn bare(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            attributes: Attributes::new(),
        }
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.get(CLASS_ATTR)
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.get(KEY_ATTR)
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.get(VALUE_ATTR)
    }

    /// Parsed `start_time`, if present and well-formed.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.get(START_TIME_ATTR).and_then(parse_stored_time)
    }
}

/// Parse a timestamp previously rendered with `TIME_FORMAT`.
pub(crate) fn parse_stored_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed edge between two node URIs.
///
/// Edges are never deduplicated: the graph keeps every edge it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// URI of the source node.
    pub source: String,
    /// URI of the target node.
    pub target: String,
    /// Attributes, including `relationship`, `origin`, `start_time` and `uri`.
    pub attributes: Attributes,
}

impl Edge {
    /// Create an edge and derive its `uri` attribute from the endpoints and
    /// the given attributes.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let mut attributes = attributes;
        attributes.remove(URI_ATTR);
        let uri = edge_uri(&source, &target, &attributes);
        attributes.insert(URI_ATTR.to_string(), uri);
        Self {
            source,
            target,
            attributes,
        }
    }

    /// Create an edge exactly as stored, without recomputing its `uri`.
    #[must_use]
    pub fn from_parts(
        source: impl Into<String>,
        target: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            attributes,
        }
    }

    /// A `describedBy` edge asserted by `origin` at `start_time`.
    #[must_use]
    pub fn described_by(
        source: &Node,
        target: &Node,
        origin: &str,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self::new(
            source.uri.clone(),
            target.uri.clone(),
            Attributes::from([
                (
                    RELATIONSHIP_ATTR.to_string(),
                    DEFAULT_RELATIONSHIP.to_string(),
                ),
                (
                    START_TIME_ATTR.to_string(),
                    start_time.format(TIME_FORMAT).to_string(),
                ),
                (ORIGIN_ATTR.to_string(), origin.to_string()),
            ]),
        )
    }

    /// The edge's label; empty if it was never computed.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.attributes.get(URI_ATTR).map_or("", String::as_str)
    }

    /// The explicit relationship, or `describedBy`.
    #[must_use]
    pub fn relationship(&self) -> &str {
        self.attributes
            .get(RELATIONSHIP_ATTR)
            .map_or(DEFAULT_RELATIONSHIP, String::as_str)
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

// =============================================================================
// SUBGRAPH
// =============================================================================

/// The atomic unit exchanged between producers and sinks.
///
/// Nodes form an ordered set keyed by URI; edges form an ordered list.
/// A subgraph holds no reference to any master graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subgraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Position of each node in `nodes`, by URI.
    index: BTreeMap<String, usize>,
}

impl Subgraph {
    /// Create an empty subgraph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node with the same URI already in the subgraph takes on
    /// the incoming attributes instead of being duplicated.
    pub fn add_node(&mut self, node: Node) {
        match self.index.get(&node.uri).and_then(|&i| self.nodes.get_mut(i)) {
            Some(existing) => existing.attributes.extend(node.attributes),
            None => {
                self.index.insert(node.uri.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Append an edge.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Find a node by URI.
    #[must_use]
    pub fn node(&self, uri: &str) -> Option<&Node> {
        self.index.get(uri).and_then(|&i| self.nodes.get(i))
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
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// The two transactions of a store import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    /// Upsert of every node, keyed by (class, key, value).
    Nodes,
    /// Creation of every edge between store-assigned ids.
    Edges,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes => write!(f, "node"),
            Self::Edges => write!(f, "edge"),
        }
    }
}

/// Errors that can occur in the Verum system.
///
/// Expected absences (a domain that does not resolve, a file extension that
/// is not recognised) are not errors and never reach this type.
#[derive(Debug, Error)]
pub enum VerumError {
    /// A node's attribute map is missing an identifying field.
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// An edge references something that cannot be resolved.
    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    /// A component descriptor is incomplete or inconsistent.
    #[error("Configuration failed: {0}")]
    Configuration(String),

    /// No constructor is registered under this name.
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The graph store rejected or failed a request.
    #[error("Store error: {0}")]
    StoreError(String),

    /// A phase of a store import aborted; nothing from that phase was kept.
    #[error("Import failed in {phase} phase: {reason}")]
    ImportFailed { phase: ImportPhase, reason: String },
}

impl From<std::io::Error> for VerumError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 11, 1, 10, 34, 0)
            .single()
            .expect("valid time")
    }

    #[test]
    fn node_new_fills_identity_attributes() {
        let node = Node::new("attribute", "domain", "example.com", t0());

        assert_eq!(node.uri, "class=attribute&key=domain&value=example.com");
        assert_eq!(node.get("uri"), Some(node.uri.as_str()));
        assert_eq!(node.get("start_time"), Some("2014-11-01T10:34:00Z"));
        assert_eq!(node.start_time(), Some(t0()));
    }

    #[test]
    fn node_from_attributes_recomputes_uri() {
        let mut attrs = Node::new("attribute", "ip", "10.0.0.1", t0()).attributes;
        attrs.insert("uri".to_string(), "bogus".to_string());

        let node = Node::from_attributes(attrs).expect("valid");
        assert_eq!(node.uri, "class=attribute&key=ip&value=10.0.0.1");
        assert_eq!(node.get("uri"), Some(node.uri.as_str()));
    }

    #[test]
    fn node_from_attributes_rejects_missing_value() {
        let attrs = Attributes::from([
            ("class".to_string(), "attribute".to_string()),
            ("key".to_string(), "ip".to_string()),
        ]);
        assert!(matches!(
            Node::from_attributes(attrs),
            Err(VerumError::InvalidNode(_))
        ));
    }

    #[test]
    fn edge_relationship_defaults_to_described_by() {
        let edge = Edge::new("a", "b", Attributes::new());
        assert_eq!(edge.relationship(), "describedBy");
        assert!(edge.uri().starts_with("source="));
    }

    #[test]
    fn subgraph_add_node_updates_in_place() {
        let mut subgraph = Subgraph::new();
        subgraph.add_node(Node::new("attribute", "domain", "example.com", t0()));

        let mut again = Node::new("attribute", "domain", "example.com", t0());
        again
            .attributes
            .insert("note".to_string(), "seen twice".to_string());
        subgraph.add_node(again);

        assert_eq!(subgraph.node_count(), 1);
        assert_eq!(subgraph.nodes()[0].get("note"), Some("seen twice"));
    }

    #[test]
    fn subgraph_lookup_follows_insertion_order() {
        let mut subgraph = Subgraph::new();
        for i in 0..1000 {
            let value = format!("10.0.{}.{}", i / 256, i % 256);
            subgraph.add_node(Node::new("attribute", "ip", &value, t0()));
        }
        subgraph.add_node(Node::new("attribute", "ip", "10.0.0.0", t0()));

        assert_eq!(subgraph.node_count(), 1000);
        assert_eq!(subgraph.nodes()[0].get("value"), Some("10.0.0.0"));
        assert_eq!(subgraph.nodes()[999].get("value"), Some("10.0.3.231"));
        let found = subgraph
            .node("class=attribute&key=ip&value=10.0.2.7")
            .expect("indexed");
        assert_eq!(found.get("value"), Some("10.0.2.7"));
        assert!(subgraph.node("class=attribute&key=ip&value=10.0.9.9").is_none());
    }

    #[test]
    fn subgraph_keeps_duplicate_edges() {
        let a = Node::new("attribute", "domain", "example.com", t0());
        let b = Node::new("attribute", "ip", "10.0.0.1", t0());
        let mut subgraph = Subgraph::new();
        subgraph.add_edge(Edge::described_by(&a, &b, "dns", t0()));
        subgraph.add_edge(Edge::described_by(&a, &b, "dns", t0()));

        assert_eq!(subgraph.edge_count(), 2);
        assert_eq!(subgraph.edges()[0].uri(), subgraph.edges()[1].uri());
    }

    #[test]
    fn import_failed_names_phase() {
        let err = VerumError::ImportFailed {
            phase: ImportPhase::Edges,
            reason: "unresolved endpoint".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Import failed in edge phase: unresolved endpoint"
        );
    }
}
