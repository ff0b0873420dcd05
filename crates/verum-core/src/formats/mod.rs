//! # Graph File Formats
//!
//! Encoders and decoders for every on-disk representation of a context graph.
//! The format is chosen from the file extension:
//!
//! | extension | format                    |
//! |-----------|---------------------------|
//! | `graphml` | GraphML (XML)             |
//! | `gml`     | Graph Modelling Language  |
//! | `gexf`    | GEXF 1.2 (XML)            |
//! | `net`     | Pajek                     |
//! | `yaml`    | YAML                      |
//! | `gpickle` | binary snapshot           |
//!
//! All formats are whole-graph: the graph is fully materialized before it is
//! written, and fully parsed before it is returned.

mod gexf;
mod gml;
mod graphml;
mod pajek;
mod persistence;
mod yaml;

pub use persistence::{MAX_SNAPSHOT_PAYLOAD_SIZE, SnapshotHeader, graph_from_bytes, graph_to_bytes};

use crate::graph::ContextGraph;
use crate::{Attributes, VerumError};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// A supported graph file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GraphFormat {
    /// GraphML; the fallback for unknown extensions.
    #[default]
    GraphMl,
    Gml,
    Gexf,
    Pajek,
    Yaml,
    /// Native binary snapshot.
    Snapshot,
}

impl GraphFormat {
    /// Every supported format.
    pub const ALL: [Self; 6] = [
        Self::GraphMl,
        Self::Gml,
        Self::Gexf,
        Self::Pajek,
        Self::Yaml,
        Self::Snapshot,
    ];

    /// File extension selecting this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::GraphMl => "graphml",
            Self::Gml => "gml",
            Self::Gexf => "gexf",
            Self::Pajek => "net",
            Self::Yaml => "yaml",
            Self::Snapshot => "gpickle",
        }
    }

    /// Format for an extension (case-insensitive), if supported.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(extension))
    }

    /// Format for a path's extension, if supported.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Encode a whole graph.
    pub fn encode(self, graph: &ContextGraph) -> Result<Vec<u8>, VerumError> {
        match self {
            Self::GraphMl => Ok(graphml::to_string(graph).into_bytes()),
            Self::Gml => Ok(gml::to_string(graph).into_bytes()),
            Self::Gexf => Ok(gexf::to_string(graph).into_bytes()),
            Self::Pajek => Ok(pajek::to_string(graph).into_bytes()),
            Self::Yaml => yaml::to_string(graph).map(String::into_bytes),
            Self::Snapshot => graph_to_bytes(graph),
        }
    }

    /// Decode a whole graph.
    pub fn decode(self, bytes: &[u8]) -> Result<ContextGraph, VerumError> {
        match self {
            Self::GraphMl => graphml::from_str(utf8(bytes)?),
            Self::Gml => gml::from_str(utf8(bytes)?),
            Self::Gexf => gexf::from_str(utf8(bytes)?),
            Self::Pajek => pajek::from_str(utf8(bytes)?),
            Self::Yaml => yaml::from_str(utf8(bytes)?),
            Self::Snapshot => graph_from_bytes(bytes),
        }
    }
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Sorted union of attribute names across a set of maps.
fn attribute_names<'a>(maps: impl Iterator<Item = &'a Attributes>) -> Vec<String> {
    maps.flat_map(|m| m.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn utf8(bytes: &[u8]) -> Result<&str, VerumError> {
    std::str::from_utf8(bytes)
        .map_err(|e| VerumError::DeserializationError(format!("not UTF-8: {e}")))
}

fn malformed(format: GraphFormat, detail: impl fmt::Display) -> VerumError {
    VerumError::DeserializationError(format!("malformed {format}: {detail}"))
}

// =============================================================================
// TESTS
// =============================================================================
