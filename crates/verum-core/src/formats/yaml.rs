//! YAML encoding: the serializable graph written as a document with `nodes`
//! and `edges` sequences.

use crate::VerumError;
use crate::graph::{ContextGraph, SerializableGraph};

pub(super) fn to_string(graph: &ContextGraph) -> Result<String, VerumError> {
    serde_yaml::to_string(&SerializableGraph::from(graph))
        .map_err(|e| VerumError::SerializationError(e.to_string()))
}

pub(super) fn from_str(text: &str) -> Result<ContextGraph, VerumError> {
    let graph: SerializableGraph = serde_yaml::from_str(text)
        .map_err(|e| VerumError::DeserializationError(format!("malformed yaml: {e}")))?;
    Ok(ContextGraph::from(graph))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_section_is_optional() {
        let doc = "nodes:\n  - uri: a\n    attributes:\n      key: domain\n";
        let graph = from_str(doc).expect("parse");
        assert_eq!(graph.node("a").and_then(|n| n.get("key")), Some("domain"));
        assert_eq!(graph.edge_count(), 0);
    }
}
