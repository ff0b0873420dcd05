//! # Binary Snapshot Format
//!
//! The `gpickle` extension: a five byte header followed by the postcard
//! encoding of a [`SerializableGraph`].
//!
//! ```text
//! +---------+---------+------------------------+
//! | "VRMG"  | version | postcard payload       |
//! | 4 bytes | 1 byte  | up to the size limit   |
//! +---------+---------+------------------------+
//! ```
//!
//! The size and the header are checked before any payload byte is decoded.

use crate::graph::{ContextGraph, SerializableGraph};
use crate::{VerumError, primitives};

/// Largest snapshot accepted by [`graph_from_bytes`].
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

const HEADER_LEN: usize = 5;

/// Leading bytes of every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }
}

impl SnapshotHeader {
    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let [a, b, c, d] = self.magic;
        [a, b, c, d, self.version]
    }

    /// Split a snapshot into its header and payload.
    pub fn split(bytes: &[u8]) -> Result<(Self, &[u8]), VerumError> {
        let Some((head, payload)) = bytes.split_first_chunk::<HEADER_LEN>() else {
            return Err(VerumError::DeserializationError(format!(
                "snapshot is {} bytes, shorter than its {HEADER_LEN} byte header",
                bytes.len()
            )));
        };
        let [a, b, c, d, version] = *head;
        Ok((
            Self {
                magic: [a, b, c, d],
                version,
            },
            payload,
        ))
    }

    /// Reject foreign files and other format versions.
    pub fn check(&self) -> Result<(), VerumError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(VerumError::DeserializationError(format!(
                "not a verum snapshot (magic {:?})",
                String::from_utf8_lossy(&self.magic)
            )));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(VerumError::DeserializationError(format!(
                "snapshot version {} is not supported (this build reads {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

/// Encode a graph as a snapshot.
pub fn graph_to_bytes(graph: &ContextGraph) -> Result<Vec<u8>, VerumError> {
    let payload = postcard::to_stdvec(&SerializableGraph::from(graph))
        .map_err(|e| VerumError::SerializationError(format!("snapshot payload: {e}")))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&SnapshotHeader::default().to_bytes());
    out.extend(payload);
    Ok(out)
}

/// Decode a snapshot.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<ContextGraph, VerumError> {
    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(VerumError::DeserializationError(format!(
            "snapshot of {} bytes exceeds the {MAX_SNAPSHOT_PAYLOAD_SIZE} byte limit",
            bytes.len()
        )));
    }
    let (header, payload) = SnapshotHeader::split(bytes)?;
    header.check()?;

    postcard::from_bytes::<SerializableGraph>(payload)
        .map(ContextGraph::from)
        .map_err(|e| VerumError::DeserializationError(format!("snapshot payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MergePolicy;
    use crate::{Edge, Node, Subgraph};
    use chrono::Utc;

    fn two_node_graph() -> ContextGraph {
        let now = Utc::now();
        let domain = Node::new("attribute", "domain", "example.com", now);
        let enrichment = Node::new("attribute", "enrichment", "dns", now);
        let mut subgraph = Subgraph::new();
        subgraph.add_edge(Edge::described_by(&domain, &enrichment, "dns", now));
        subgraph.add_node(domain);
        subgraph.add_node(enrichment);

        let mut graph = ContextGraph::new();
        graph.merge(&subgraph, MergePolicy::LastWriteWins);
        graph
    }

    #[test]
    fn snapshot_starts_with_header() {
        let bytes = graph_to_bytes(&two_node_graph()).expect("encode");
        let (header, payload) = SnapshotHeader::split(&bytes).expect("split");
        assert_eq!(header, SnapshotHeader::default());
        assert!(!payload.is_empty());
    }

    #[test]
    fn reencoding_is_stable() {
        let graph = two_node_graph();
        let first = graph_to_bytes(&graph).expect("encode");
        let restored = graph_from_bytes(&first).expect("decode");

        assert_eq!(restored, graph);
        assert_eq!(graph_to_bytes(&restored).expect("encode again"), first);
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let mut bytes = graph_to_bytes(&two_node_graph()).expect("encode");
        bytes[..4].copy_from_slice(b"KRMS");
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(VerumError::DeserializationError(msg)) if msg.contains("not a verum snapshot")
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut bytes = graph_to_bytes(&two_node_graph()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(graph_from_bytes(b"VRM").is_err());
        assert!(graph_from_bytes(&[]).is_err());
    }
}
