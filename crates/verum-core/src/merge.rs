//! # Merge Engine
//!
//! Owns the in-memory master graph and moves it to and from disk.
//!
//! - `merge`: node-dedup / edge-append, see [`ContextGraph::merge`]
//! - `persist` / `load`: whole-graph, format chosen by file extension
//!
//! An unknown extension is not an error: writes fall back to GraphML and
//! reads produce an empty graph, both with a warning.
//!
//! The engine holds no lock. `merge` takes `&mut self`, so a single writer
//! per master graph is enforced by the borrow checker; share it across
//! threads behind your own mutex.

use crate::config::ComponentConfig;
use crate::formats::GraphFormat;
use crate::graph::{ContextGraph, MergePolicy, MergeStats};
use crate::{Subgraph, VerumError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// =============================================================================
// SINK CAPABILITY
// =============================================================================

/// A component that accepts subgraphs into a master graph.
pub trait GraphSink {
    /// Merge one subgraph atomically.
    fn merge(&mut self, subgraph: &Subgraph) -> MergeStats;

    /// The live master graph. Not a copy.
    fn graph(&self) -> &ContextGraph;

    /// Write the whole master graph to `target`.
    fn persist(&self, target: &Path) -> Result<(), VerumError>;

    /// Read a whole graph from `source`. Does not touch the master graph.
    fn load(&self, source: &Path) -> Result<ContextGraph, VerumError>;

    /// Write the master graph to the sink's configured target.
    fn persist_default(&self) -> Result<(), VerumError>;
}

// =============================================================================
// FILE I/O
// =============================================================================

/// Write `graph` to `target` in the format its extension names.
pub fn persist_graph(graph: &ContextGraph, target: &Path) -> Result<(), VerumError> {
    let format = GraphFormat::from_path(target).unwrap_or_else(|| {
        warn!(path = %target.display(), "file format not found, writing graphml");
        GraphFormat::default()
    });

    info!(
        path = %target.display(),
        %format,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "writing graph"
    );
    let bytes = format.encode(graph)?;
    fs::write(target, bytes)?;
    Ok(())
}

/// Read a graph from `source` in the format its extension names.
///
/// An unknown extension yields an empty graph.
pub fn load_graph(source: &Path) -> Result<ContextGraph, VerumError> {
    let Some(format) = GraphFormat::from_path(source) else {
        warn!(path = %source.display(), "file format not found, returning empty graph");
        return Ok(ContextGraph::new());
    };

    info!(path = %source.display(), %format, "reading graph");
    let bytes = fs::read(source)?;
    format.decode(&bytes)
}

// =============================================================================
// MERGE ENGINE
// =============================================================================

/// The in-memory context graph sink.
#[derive(Debug, Default)]
pub struct MergeEngine {
    graph: ContextGraph,
    context_graph_file: Option<PathBuf>,
    policy: MergePolicy,
}

impl MergeEngine {
    /// An engine with an empty graph and no backing file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine over an existing graph.
    #[must_use]
    pub fn with_graph(graph: ContextGraph) -> Self {
        Self {
            graph,
            ..Self::default()
        }
    }

    /// Build from configuration, loading `context_graph_file` if it exists.
    ///
    /// A file that cannot be read is logged and the engine starts empty.
    #[must_use]
    pub fn from_config(config: &ComponentConfig) -> Self {
        let mut engine = Self {
            context_graph_file: config.context_graph_file.clone(),
            ..Self::default()
        };

        if let Some(path) = engine.context_graph_file.as_deref().filter(|p| p.is_file()) {
            match load_graph(path) {
                Ok(graph) => {
                    info!(
                        path = %path.display(),
                        nodes = graph.node_count(),
                        edges = graph.edge_count(),
                        "loaded context graph"
                    );
                    engine.graph = graph;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "context graph not loaded"),
            }
        }
        engine
    }

    /// Set how node attributes are reconciled on merge.
    #[must_use]
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// The configured backing file, if any.
    #[must_use]
    pub fn context_graph_file(&self) -> Option<&Path> {
        self.context_graph_file.as_deref()
    }

    /// Consume the engine, keeping its graph.
    #[must_use]
    pub fn into_graph(self) -> ContextGraph {
        self.graph
    }
}

impl GraphSink for MergeEngine {
    fn merge(&mut self, subgraph: &Subgraph) -> MergeStats {
        let stats = self.graph.merge(subgraph, self.policy);
        debug!(
            nodes_added = stats.nodes_added,
            nodes_updated = stats.nodes_updated,
            edges_added = stats.edges_added,
            "merged subgraph"
        );
        stats
    }

    fn graph(&self) -> &ContextGraph {
        &self.graph
    }

    fn persist(&self, target: &Path) -> Result<(), VerumError> {
        persist_graph(&self.graph, target)
    }

    fn load(&self, source: &Path) -> Result<ContextGraph, VerumError> {
        load_graph(source)
    }

    fn persist_default(&self) -> Result<(), VerumError> {
        let path = self.context_graph_file.as_deref().ok_or_else(|| {
            VerumError::Configuration("no context_graph_file configured".to_string())
        })?;
        self.persist(path)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, Node};
    use chrono::Utc;
    use tempfile::TempDir;

    fn subgraph() -> Subgraph {
        let now = Utc::now();
        let domain = Node::new("attribute", "domain", "example.com", now);
        let dns = Node::new("attribute", "enrichment", "dns", now);
        let mut subgraph = Subgraph::new();
        subgraph.add_edge(Edge::described_by(&domain, &dns, "dns", now));
        subgraph.add_node(domain);
        subgraph.add_node(dns);
        subgraph
    }

    #[test]
    fn merge_goes_through_policy() {
        let mut engine = MergeEngine::new().with_policy(MergePolicy::NewerStartTime);
        engine.merge(&subgraph());
        assert_eq!(engine.policy(), MergePolicy::NewerStartTime);
        assert_eq!(engine.graph().node_count(), 2);
    }

    #[test]
    fn from_config_loads_existing_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("context.graphml");

        let mut first = MergeEngine::new();
        first.merge(&subgraph());
        first.persist(&path).expect("persist");

        let config = ComponentConfig {
            context_graph_file: Some(path),
            ..ComponentConfig::default()
        };
        let engine = MergeEngine::from_config(&config);
        assert_eq!(engine.graph().node_count(), 2);
        assert_eq!(engine.graph().edge_count(), 1);
    }

    #[test]
    fn from_config_with_missing_file_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let config = ComponentConfig {
            context_graph_file: Some(dir.path().join("absent.gpickle")),
            ..ComponentConfig::default()
        };
        let engine = MergeEngine::from_config(&config);
        assert!(engine.graph().is_empty());
        assert!(engine.context_graph_file().is_some());
    }

    #[test]
    fn from_config_with_corrupt_file_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("broken.gpickle");
        fs::write(&path, b"not a snapshot").expect("write");

        let config = ComponentConfig {
            context_graph_file: Some(path),
            ..ComponentConfig::default()
        };
        assert!(MergeEngine::from_config(&config).graph().is_empty());
    }

    #[test]
    fn persist_default_requires_a_file() {
        assert!(matches!(
            MergeEngine::new().persist_default(),
            Err(VerumError::Configuration(_))
        ));
    }
}
