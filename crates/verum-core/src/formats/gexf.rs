//! GEXF 1.2 encoding.
//!
//! Attributes are declared per class (`node` / `edge`) and referenced by
//! numeric id from `<attvalue>` elements.

use super::graphml::required;
use super::{GraphFormat, attribute_names, malformed};
use crate::graph::{ContextGraph, MergePolicy};
use crate::{Attributes, Edge, Node, VerumError};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use std::collections::BTreeMap;

const NAMESPACE: &str = "http://www.gexf.net/1.2draft";

/// Attribute holding a node label that is not its id.
const LABEL_ATTR: &str = "label";

pub(super) fn to_string(graph: &ContextGraph) -> String {
    let node_keys = attribute_names(graph.nodes().map(|n| &n.attributes));
    let edge_keys = attribute_names(graph.edges().iter().map(|e| &e.attributes));

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<gexf xmlns=\"{NAMESPACE}\" version=\"1.2\">\n"));
    out.push_str("  <graph defaultedgetype=\"directed\" mode=\"static\">\n");
    for (class, keys) in [("node", &node_keys), ("edge", &edge_keys)] {
        out.push_str(&format!("    <attributes class=\"{class}\">\n"));
        for (id, title) in keys.iter().enumerate() {
            out.push_str(&format!(
                "      <attribute id=\"{id}\" title=\"{}\" type=\"string\"/>\n",
                escape(title.as_str())
            ));
        }
        out.push_str("    </attributes>\n");
    }

    out.push_str("    <nodes>\n");
    for node in graph.nodes() {
        let uri = escape(node.uri.as_str());
        out.push_str(&format!("      <node id=\"{uri}\" label=\"{uri}\">\n"));
        write_attvalues(&mut out, &node.attributes, &node_keys);
        out.push_str("      </node>\n");
    }
    out.push_str("    </nodes>\n");

    out.push_str("    <edges>\n");
    for (id, edge) in graph.edges().iter().enumerate() {
        out.push_str(&format!(
            "      <edge id=\"{id}\" source=\"{}\" target=\"{}\">\n",
            escape(edge.source.as_str()),
            escape(edge.target.as_str())
        ));
        write_attvalues(&mut out, &edge.attributes, &edge_keys);
        out.push_str("      </edge>\n");
    }
    out.push_str("    </edges>\n  </graph>\n</gexf>\n");
    out
}

fn write_attvalues(out: &mut String, attributes: &Attributes, keys: &[String]) {
    out.push_str("        <attvalues>\n");
    for (name, value) in attributes {
        if let Some(id) = keys.iter().position(|k| k == name) {
            out.push_str(&format!(
                "          <attvalue for=\"{id}\" value=\"{}\"/>\n",
                escape(value.as_str())
            ));
        }
    }
    out.push_str("        </attvalues>\n");
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Node,
    Edge,
}

pub(super) fn from_str(text: &str) -> Result<ContextGraph, VerumError> {
    let mut reader = Reader::from_str(text);
    let mut graph = ContextGraph::new();
    let mut titles: BTreeMap<(Class, String), String> = BTreeMap::new();
    let mut declaring: Option<Class> = None;
    let mut node: Option<(String, Attributes)> = None;
    let mut edge: Option<(String, String, Attributes)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(GraphFormat::Gexf, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let self_closing = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"attributes" => {
                        declaring = match required(e, b"class")?.as_str() {
                            "node" => Some(Class::Node),
                            "edge" => Some(Class::Edge),
                            _ => None,
                        };
                    }
                    b"attribute" => {
                        if let Some(class) = declaring {
                            titles.insert(
                                (class, required(e, b"id")?),
                                required(e, b"title")?,
                            );
                        }
                    }
                    b"node" => {
                        // Edges refer to `id`. A label that differs from it is
                        // display text and is kept as an attribute.
                        let uri = required(e, b"id")?;
                        let mut attributes = Attributes::new();
                        if let Ok(label) = required(e, b"label")
                            && label != uri
                        {
                            attributes.insert(LABEL_ATTR.to_string(), label);
                        }
                        if self_closing {
                            let empty = Node { uri, attributes };
                            graph.upsert_node(empty, MergePolicy::LastWriteWins);
                        } else {
                            node = Some((uri, attributes));
                        }
                    }
                    b"edge" => {
                        let source = required(e, b"source")?;
                        let target = required(e, b"target")?;
                        if self_closing {
                            graph.add_edge(Edge::from_parts(source, target, Attributes::new()));
                        } else {
                            edge = Some((source, target, Attributes::new()));
                        }
                    }
                    b"attvalue" => {
                        let id = required(e, b"for")?;
                        let value = required(e, b"value")?;
                        let (class, attributes) = match (node.as_mut(), edge.as_mut()) {
                            (Some((_, attrs)), _) => (Class::Node, attrs),
                            (None, Some((_, _, attrs))) => (Class::Edge, attrs),
                            (None, None) => continue,
                        };
                        let title = titles.get(&(class, id.clone())).ok_or_else(|| {
                            malformed(GraphFormat::Gexf, format!("undeclared attribute '{id}'"))
                        })?;
                        attributes.insert(title.clone(), value);
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"attributes" => declaring = None,
                b"node" => {
                    if let Some((uri, attributes)) = node.take() {
                        graph.upsert_node(Node { uri, attributes }, MergePolicy::LastWriteWins);
                    }
                }
                b"edge" => {
                    if let Some((source, target, attributes)) = edge.take() {
                        graph.add_edge(Edge::from_parts(source, target, attributes));
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
