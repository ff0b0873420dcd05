//! GraphML encoding.
//!
//! Every attribute is declared as a string `<key>`; node ids are node URIs.
//! Parallel edges are written in graph order and read back in document order.

use super::{GraphFormat, attribute_names, malformed};
use crate::graph::{ContextGraph, MergePolicy};
use crate::{Attributes, Edge, Node, VerumError};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;

const NAMESPACE: &str = "http://graphml.graphdrawing.org/xmlns";

pub(super) fn to_string(graph: &ContextGraph) -> String {
    let node_keys = attribute_names(graph.nodes().map(|n| &n.attributes));
    let edge_keys = attribute_names(graph.edges().iter().map(|e| &e.attributes));

    // Key ids: node attributes first, then edge attributes.
    let node_ids: BTreeMap<&str, String> = node_keys
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), format!("d{i}")))
        .collect();
    let edge_ids: BTreeMap<&str, String> = edge_keys
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), format!("d{}", i + node_keys.len())))
        .collect();

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<graphml xmlns=\"{NAMESPACE}\">\n"));
    for (domain, ids) in [("node", &node_ids), ("edge", &edge_ids)] {
        for (name, id) in ids {
            out.push_str(&format!(
                "  <key id=\"{id}\" for=\"{domain}\" attr.name=\"{}\" attr.type=\"string\"/>\n",
                escape(*name)
            ));
        }
    }

    out.push_str("  <graph edgedefault=\"directed\">\n");
    for node in graph.nodes() {
        out.push_str(&format!("    <node id=\"{}\">\n", escape(node.uri.as_str())));
        write_data(&mut out, &node.attributes, &node_ids);
        out.push_str("    </node>\n");
    }
    for edge in graph.edges() {
        out.push_str(&format!(
            "    <edge id=\"{}\" source=\"{}\" target=\"{}\">\n",
            escape(edge.uri()),
            escape(edge.source.as_str()),
            escape(edge.target.as_str())
        ));
        write_data(&mut out, &edge.attributes, &edge_ids);
        out.push_str("    </edge>\n");
    }
    out.push_str("  </graph>\n</graphml>\n");
    out
}

fn write_data(out: &mut String, attributes: &Attributes, ids: &BTreeMap<&str, String>) {
    for (name, value) in attributes {
        if let Some(id) = ids.get(name.as_str()) {
            out.push_str(&format!(
                "      <data key=\"{id}\">{}</data>\n",
                escape(value.as_str())
            ));
        }
    }
}

/// Element currently being read.
enum Open {
    Node {
        uri: String,
        attributes: Attributes,
    },
    Edge {
        source: String,
        target: String,
        attributes: Attributes,
    },
}

impl Open {
    fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            Self::Node { attributes, .. } | Self::Edge { attributes, .. } => attributes,
        }
    }

    fn close(self, graph: &mut ContextGraph) {
        match self {
            Self::Node { uri, attributes } => {
                graph.upsert_node(Node { uri, attributes }, MergePolicy::LastWriteWins);
            }
            Self::Edge {
                source,
                target,
                attributes,
            } => graph.add_edge(Edge::from_parts(source, target, attributes)),
        }
    }
}

pub(super) fn from_str(text: &str) -> Result<ContextGraph, VerumError> {
    let mut reader = Reader::from_str(text);
    let mut graph = ContextGraph::new();
    let mut keys: BTreeMap<String, String> = BTreeMap::new();
    let mut open: Option<Open> = None;
    let mut data: Option<(String, String)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(GraphFormat::GraphMl, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let self_closing = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"key" => {
                        let id = required(e, b"id")?;
                        let name = required(e, b"attr.name")?;
                        keys.insert(id, name);
                    }
                    b"node" => {
                        let element = Open::Node {
                            uri: required(e, b"id")?,
                            attributes: Attributes::new(),
                        };
                        if self_closing {
                            element.close(&mut graph);
                        } else {
                            open = Some(element);
                        }
                    }
                    b"edge" => {
                        let element = Open::Edge {
                            source: required(e, b"source")?,
                            target: required(e, b"target")?,
                            attributes: Attributes::new(),
                        };
                        if self_closing {
                            element.close(&mut graph);
                        } else {
                            open = Some(element);
                        }
                    }
                    b"data" if !self_closing => {
                        let key = required(e, b"key")?;
                        let name = keys.get(&key).cloned().ok_or_else(|| {
                            malformed(GraphFormat::GraphMl, format!("undeclared key '{key}'"))
                        })?;
                        data = Some((name, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if let Some((_, buffer)) = data.as_mut() {
                    let chunk = t
                        .unescape()
                        .map_err(|e| malformed(GraphFormat::GraphMl, e))?;
                    buffer.push_str(&chunk);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"data" => {
                    if let (Some((name, value)), Some(element)) = (data.take(), open.as_mut()) {
                        element.attributes_mut().insert(name, value);
                    }
                }
                b"node" | b"edge" => {
                    if let Some(element) = open.take() {
                        element.close(&mut graph);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(graph)
}

/// Unescaped value of a required XML attribute.
pub(super) fn required(element: &BytesStart<'_>, name: &[u8]) -> Result<String, VerumError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| VerumError::DeserializationError(e.to_string()))?;
        if attribute.key.as_ref() == name {
            let value = attribute
                .unescape_value()
                .map_err(|e| VerumError::DeserializationError(e.to_string()))?;
            return Ok(value.into_owned());
        }
    }
    Err(VerumError::DeserializationError(format!(
        "<{}> is missing attribute '{}'",
        String::from_utf8_lossy(element.local_name().as_ref()),
        String::from_utf8_lossy(name)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_foreign_document_with_self_closing_nodes() {
        let doc = r#"<?xml version="1.0"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="k0" for="node" attr.name="key" attr.type="string"/>
  <graph edgedefault="directed">
    <node id="a"><data key="k0">domain</data></node>
    <node id="b"/>
    <edge source="a" target="b"/>
  </graph>
</graphml>"#;

        let graph = from_str(doc).expect("parse");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node("a").and_then(|n| n.get("key")), Some("domain"));
    }

    #[test]
    fn undeclared_key_is_rejected() {
        let doc = r#"<graphml><graph><node id="a"><data key="nope">x</data></node></graph></graphml>"#;
        assert!(from_str(doc).is_err());
    }
}
