//! GML (Graph Modelling Language) encoding.
//!
//! Nodes are numbered in URI order and labelled with their URI. String values
//! escape `&` and `"` as character entities. Attribute names that are not GML
//! keys, or that collide with a structural key, are skipped with a warning.

use super::{GraphFormat, malformed};
use crate::graph::{ContextGraph, MergePolicy};
use crate::{Attributes, Edge, Node, VerumError};
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

const NODE_RESERVED: &[&str] = &["id", "label"];
const EDGE_RESERVED: &[&str] = &["source", "target", "key"];

pub(super) fn to_string(graph: &ContextGraph) -> String {
    let ids: BTreeMap<&str, usize> = graph
        .nodes()
        .enumerate()
        .map(|(i, node)| (node.uri.as_str(), i))
        .collect();

    let mut out = String::from("graph [\n  directed 1\n  multigraph 1\n");
    for (id, node) in graph.nodes().enumerate() {
        out.push_str("  node [\n");
        out.push_str(&format!("    id {id}\n    label \"{}\"\n", escape(&node.uri)));
        write_attributes(&mut out, &node.attributes, NODE_RESERVED);
        out.push_str("  ]\n");
    }
    for edge in graph.edges() {
        // Every endpoint is a node of the graph.
        let (Some(source), Some(target)) = (
            ids.get(edge.source.as_str()),
            ids.get(edge.target.as_str()),
        ) else {
            continue;
        };
        out.push_str("  edge [\n");
        out.push_str(&format!("    source {source}\n    target {target}\n"));
        write_attributes(&mut out, &edge.attributes, EDGE_RESERVED);
        out.push_str("  ]\n");
    }
    out.push_str("]\n");
    out
}

fn write_attributes(out: &mut String, attributes: &Attributes, reserved: &[&str]) {
    for (name, value) in attributes {
        if !is_key(name) || reserved.contains(&name.as_str()) {
            tracing::warn!(attribute = %name, "attribute cannot be written as a GML key, skipped");
            continue;
        }
        out.push_str(&format!("    {name} \"{}\"\n", escape(value)));
    }
}

fn is_key(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "quot" => Some('"'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix('#')
                    .and_then(|code| code.parse::<u32>().ok())
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// =============================================================================
// PARSER
// =============================================================================

#[derive(Debug, PartialEq)]
enum Token {
    Key(String),
    Text(String),
    Number(String),
    Open,
    Close,
}

#[derive(Debug)]
enum Value {
    Scalar(String),
    List(Vec<(String, Value)>),
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, VerumError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = *self.chars.peek()?;
            if c.is_whitespace() {
                self.chars.next();
            } else if c == '#' {
                // Comment to end of line.
                for c in self.chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }

        let c = self.chars.next()?;
        let token = match c {
            '[' => Token::Open,
            ']' => Token::Close,
            '"' => {
                let mut text = String::new();
                loop {
                    match self.chars.next() {
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => {
                            return Some(Err(malformed(GraphFormat::Gml, "unterminated string")));
                        }
                    }
                }
                Token::Text(unescape(&text))
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                Token::Key(self.take_while(c, |c| c.is_ascii_alphanumeric() || c == '_'))
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => Token::Number(
                self.take_while(c, |c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')),
            ),
            other => {
                return Some(Err(malformed(
                    GraphFormat::Gml,
                    format!("unexpected character '{other}'"),
                )));
            }
        };
        Some(Ok(token))
    }
}

impl Lexer<'_> {
    fn take_while(&mut self, first: char, keep: impl Fn(char) -> bool) -> String {
        let mut text = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if !keep(c) {
                break;
            }
            text.push(c);
            self.chars.next();
        }
        text
    }
}

/// Parse `key value` pairs until the matching `]` (or end of input at top level).
fn parse_list(lexer: &mut Lexer<'_>, nested: bool) -> Result<Vec<(String, Value)>, VerumError> {
    let mut items = Vec::new();
    loop {
        let key = match lexer.next().transpose()? {
            Some(Token::Key(key)) => key,
            Some(Token::Close) if nested => return Ok(items),
            None if !nested => return Ok(items),
            None => return Err(malformed(GraphFormat::Gml, "unexpected end of input")),
            Some(other) => {
                return Err(malformed(GraphFormat::Gml, format!("expected key, found {other:?}")));
            }
        };
        let value = match lexer.next().transpose()? {
            Some(Token::Text(text) | Token::Number(text)) => Value::Scalar(text),
            Some(Token::Open) => Value::List(parse_list(lexer, true)?),
            _ => {
                return Err(malformed(GraphFormat::Gml, format!("key '{key}' has no value")));
            }
        };
        items.push((key, value));
    }
}

pub(super) fn from_str(text: &str) -> Result<ContextGraph, VerumError> {
    let mut lexer = Lexer {
        chars: text.chars().peekable(),
    };
    let document = parse_list(&mut lexer, false)?;
    let items = document
        .into_iter()
        .find_map(|(key, value)| match (key.as_str(), value) {
            ("graph", Value::List(items)) => Some(items),
            _ => None,
        })
        .ok_or_else(|| malformed(GraphFormat::Gml, "no graph block"))?;

    let mut graph = ContextGraph::new();
    let mut uris: BTreeMap<String, String> = BTreeMap::new();
    let mut edges = Vec::new();

    for (key, value) in items {
        let Value::List(fields) = value else {
            continue;
        };
        match key.as_str() {
            "node" => {
                let (mut id, mut label, mut attributes) = (None, None, Attributes::new());
                for (name, value) in fields {
                    let Value::Scalar(value) = value else {
                        continue;
                    };
                    match name.as_str() {
                        "id" => id = Some(value),
                        "label" => label = Some(value),
                        _ => {
                            attributes.insert(name, value);
                        }
                    }
                }
                let id = id.ok_or_else(|| malformed(GraphFormat::Gml, "node without id"))?;
                let uri = label.unwrap_or_else(|| id.clone());
                uris.insert(id, uri.clone());
                graph.upsert_node(Node { uri, attributes }, MergePolicy::LastWriteWins);
            }
            "edge" => edges.push(fields),
            _ => {}
        }
    }

    for fields in edges {
        let (mut source, mut target, mut attributes) = (None, None, Attributes::new());
        for (name, value) in fields {
            let Value::Scalar(value) = value else {
                continue;
            };
            match name.as_str() {
                "source" => source = Some(value),
                "target" => target = Some(value),
                "key" => {}
                _ => {
                    attributes.insert(name, value);
                }
            }
        }
        let endpoint = |id: Option<String>| {
            id.and_then(|id| uris.get(&id).cloned())
                .ok_or_else(|| malformed(GraphFormat::Gml, "edge endpoint is not a node"))
        };
        let source = endpoint(source)?;
        let target = endpoint(target)?;
        graph.add_edge(Edge::from_parts(source, target, attributes));
    }

    Ok(graph)
}
