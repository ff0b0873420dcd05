//! # verum-core
//!
//! The context graph engine for Verum.
//!
//! Independent producers describe observables (domains, addresses, ...) as
//! small subgraphs. Because every node's identity is derived from its content,
//! subgraphs produced anywhere, at any time, land on the same nodes when they
//! are merged into a master graph or imported into a graph store.
//!
//! ## Layout
//!
//! - `identity`: node and edge URIs
//! - `enrichment`: the producer contract and the DNS producer
//! - `graph` / `merge`: the in-memory master graph and the sink around it
//! - `formats`: whole-graph file formats, chosen by extension
//! - `importer` / `storage`: two-phase transactional import and the redb store
//! - `config` / `registry`: component descriptors and name → constructor lookup
//!
//! ## Architectural Constraints
//!
//! - Synchronous: no async runtime anywhere in the crate
//! - Deterministic: attribute maps are ordered, identifiers are never random
//! - Closed: components are built only through the registry

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod enrichment;
pub mod formats;
pub mod graph;
pub mod identity;
pub mod importer;
pub mod merge;
pub mod primitives;
pub mod registry;
pub mod storage;
pub mod time;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Attributes, Edge, ImportPhase, Node, StoreId, Subgraph, VerumError};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use graph::{ContextGraph, MergePolicy, MergeStats, SerializableGraph};
pub use identity::{edge_uri, node_uri, uri_hash};
pub use merge::{GraphSink, MergeEngine, load_graph, persist_graph};
pub use time::StartTime;

// =============================================================================
// RE-EXPORTS: Enrichment and Components
// =============================================================================

pub use config::{ComponentConfig, ComponentKind, Descriptor};
pub use enrichment::{DnsEnricher, Enricher, EnrichmentBuilder};
pub use registry::{Pipeline, Registry};

// =============================================================================
// RE-EXPORTS: Import (from importer and storage modules)
// =============================================================================

pub use formats::{GraphFormat, SnapshotHeader, graph_from_bytes, graph_to_bytes};
pub use importer::{ImportReport, Importer, NodeMap, TransactionalStore};
pub use storage::RedbStore;
