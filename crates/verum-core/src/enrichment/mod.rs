//! # Enrichment
//!
//! Producers turn one observable into a small subgraph describing it.
//!
//! Every producer follows the same shape:
//! - the observable always gets a node
//! - on success, one enrichment node names the producer, one node per datum
//! - every datum and the enrichment node hang off the observable through a
//!   `describedBy` edge whose `origin` is the producer
//!
//! Failing to enrich is an expected outcome and yields the observable node
//! alone. Producers never return errors.

mod dns;

pub use dns::{DNS_ORIGIN, DnsEnricher, DnsResolver, Resolution, SystemResolver};

use crate::config::Descriptor;
use crate::primitives::{ATTRIBUTE_CLASS, DEFAULT_RELATIONSHIP, ENRICHMENT_KEY};
use crate::time::StartTime;
use crate::{Edge, Node, Subgraph};
use chrono::{DateTime, Utc};

/// A source of enrichment subgraphs.
pub trait Enricher {
    /// Describe `observable`. Bad or missing `start_time` means now.
    fn produce(&self, observable: &str, start_time: Option<&StartTime>) -> Subgraph;

    /// What this producer accepts and what it costs to run.
    fn describe(&self) -> Descriptor;
}

/// Incremental builder for a producer's subgraph.
///
/// Holds the observable node and the enrichment node, and wires every datum
/// to the observable with a `describedBy` edge from `origin`.
#[derive(Debug)]
pub struct EnrichmentBuilder {
    origin: String,
    start_time: DateTime<Utc>,
    observable: Node,
    data: Vec<(Node, Edge)>,
}

impl EnrichmentBuilder {
    /// Start with the observable `(attribute, key, value)`.
    #[must_use]
    pub fn new(origin: &str, key: &str, value: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            origin: origin.to_string(),
            start_time,
            observable: Node::new(ATTRIBUTE_CLASS, key, value, start_time),
            data: Vec::new(),
        }
    }

    /// Add a datum node linked from the observable.
    pub fn datum(&mut self, key: &str, value: &str) {
        self.push_datum(key, value, None);
    }

    /// Add a datum whose edge also says what the datum describes
    /// (`describedBy = <role>`), e.g. a nameserver.
    pub fn datum_as(&mut self, key: &str, value: &str, role: &str) {
        self.push_datum(key, value, Some(role));
    }

    fn push_datum(&mut self, key: &str, value: &str, role: Option<&str>) {
        let node = Node::new(ATTRIBUTE_CLASS, key, value, self.start_time);
        let mut edge = Edge::described_by(&self.observable, &node, &self.origin, self.start_time);
        if let Some(role) = role {
            let mut attributes = edge.attributes;
            attributes.insert(DEFAULT_RELATIONSHIP.to_string(), role.to_string());
            edge = Edge::new(edge.source, edge.target, attributes);
        }
        self.data.push((node, edge));
    }

    /// The observable alone: enrichment failed or found nothing.
    #[must_use]
    pub fn observable_only(self) -> Subgraph {
        let mut subgraph = Subgraph::new();
        subgraph.add_node(self.observable);
        subgraph
    }

    /// The observable, the enrichment node and every datum.
    ///
    /// Edge order: the first datum, the enrichment edge, then the rest.
    #[must_use]
    pub fn finish(self) -> Subgraph {
        let enrichment = Node::new(ATTRIBUTE_CLASS, ENRICHMENT_KEY, &self.origin, self.start_time);
        let enrichment_edge =
            Edge::described_by(&self.observable, &enrichment, &self.origin, self.start_time);

        let mut subgraph = Subgraph::new();
        subgraph.add_node(self.observable);
        subgraph.add_node(enrichment);

        let mut data = self.data.into_iter();
        if let Some((node, edge)) = data.next() {
            subgraph.add_node(node);
            subgraph.add_edge(edge);
        }
        subgraph.add_edge(enrichment_edge);
        for (node, edge) in data {
            subgraph.add_node(node);
            subgraph.add_edge(edge);
        }
        subgraph
    }
}
