//! Pajek `.net` encoding.
//!
//! ```text
//! *vertices 2
//! 1 "class=attribute&key=domain&value=example.com" "key" "domain" ...
//! 2 "class=attribute&key=ip&value=10.0.0.1" ...
//! *arcs
//! 1 2 "relationship" "describedBy" ...
//! ```
//!
//! Attributes follow the label as quoted name/value pairs. Inside quotes,
//! `\"`, `\\` and `\n` are escapes. An arc line with an odd number of extra
//! tokens starts with a Pajek weight, kept as the `weight` attribute.

use super::{GraphFormat, malformed};
use crate::graph::{ContextGraph, MergePolicy};
use crate::{Attributes, Edge, Node, VerumError};
use std::collections::BTreeMap;

const WEIGHT_ATTR: &str = "weight";

pub(super) fn to_string(graph: &ContextGraph) -> String {
    let mut out = format!("*vertices {}\n", graph.node_count());
    let mut ids: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, node) in graph.nodes().enumerate() {
        let id = i + 1;
        ids.insert(node.uri.as_str(), id);
        out.push_str(&format!("{id} {}", quote(&node.uri)));
        write_pairs(&mut out, &node.attributes);
        out.push('\n');
    }

    out.push_str("*arcs\n");
    for edge in graph.edges() {
        let (Some(source), Some(target)) = (
            ids.get(edge.source.as_str()),
            ids.get(edge.target.as_str()),
        ) else {
            continue;
        };
        out.push_str(&format!("{source} {target}"));
        write_pairs(&mut out, &edge.attributes);
        out.push('\n');
    }
    out
}

fn write_pairs(out: &mut String, attributes: &Attributes) {
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(&quote(name));
        out.push(' ');
        out.push_str(&quote(value));
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Split a line into bare and quoted tokens.
fn tokens(line: &str) -> Result<Vec<String>, VerumError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => token.push('\n'),
                        Some(escaped) => token.push(escaped),
                        None => return Err(malformed(GraphFormat::Pajek, "dangling escape")),
                    },
                    Some(c) => token.push(c),
                    None => return Err(malformed(GraphFormat::Pajek, "unterminated quote")),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn pairs(rest: &[String]) -> Attributes {
    rest.chunks(2)
        .filter_map(|pair| match pair {
            [name, value] => Some((name.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Vertices,
    Arcs,
}

pub(super) fn from_str(text: &str) -> Result<ContextGraph, VerumError> {
    let mut graph = ContextGraph::new();
    let mut uris: BTreeMap<String, String> = BTreeMap::new();
    let mut section = Section::Preamble;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        if let Some(header) = trimmed.strip_prefix('*') {
            let name = header.split_whitespace().next().unwrap_or_default();
            section = match name.to_ascii_lowercase().as_str() {
                "vertices" => Section::Vertices,
                "arcs" | "edges" => Section::Arcs,
                other => {
                    return Err(malformed(GraphFormat::Pajek, format!("unknown section *{other}")));
                }
            };
            continue;
        }

        let fields = tokens(trimmed)?;
        match (section, fields.as_slice()) {
            (Section::Vertices, [id]) => {
                uris.insert(id.clone(), id.clone());
                graph.upsert_node(Node::bare(id.clone()), MergePolicy::LastWriteWins);
            }
            (Section::Vertices, [id, label, rest @ ..]) => {
                uris.insert(id.clone(), label.clone());
                let node = Node {
                    uri: label.clone(),
                    attributes: pairs(rest),
                };
                graph.upsert_node(node, MergePolicy::LastWriteWins);
            }
            (Section::Arcs, [source, target, rest @ ..]) => {
                let endpoint = |id: &String| {
                    uris.get(id).cloned().ok_or_else(|| {
                        malformed(GraphFormat::Pajek, format!("arc references unknown vertex {id}"))
                    })
                };
                let attributes = match rest.split_first() {
                    Some((weight, pairs_after)) if rest.len() % 2 == 1 => {
                        let mut attributes = pairs(pairs_after);
                        attributes.insert(WEIGHT_ATTR.to_string(), weight.clone());
                        attributes
                    }
                    _ => pairs(rest),
                };
                graph.add_edge(Edge::from_parts(endpoint(source)?, endpoint(target)?, attributes));
            }
            _ => {
                return Err(malformed(GraphFormat::Pajek, format!("unexpected line '{trimmed}'")));
            }
        }
    }

    Ok(graph)
}
