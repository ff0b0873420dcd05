//! # Identity Scheme
//!
//! Deterministic identifiers for nodes and edges.
//!
//! A node URI is the only thing that decides whether two nodes are the same
//! entity, so `node_uri` must stay byte-stable across releases. Edge URIs are
//! descriptive labels: two edges with equal URIs are still two edges.

use crate::Attributes;
use crate::primitives::{ORIGIN_ATTR, RELATIONSHIP_ATTR};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Canonical URI of the node identified by `(class, key, value)`.
#[must_use]
pub fn node_uri(class: &str, key: &str, value: &str) -> String {
    format!("class={class}&key={key}&value={value}")
}

/// Name-based (v3, URL namespace) hash of a URI.
///
/// Stable across processes and machines.
#[must_use]
pub fn uri_hash(uri: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_URL, uri.as_bytes()).to_string()
}

/// Label of an edge between two node URIs.
///
/// The relationship chain starts at the `relationship` key: each step appends
/// `&<key>=<value>` and continues with the key named after that value. A key
/// is never visited twice, so self-referencing attribute maps terminate.
#[must_use]
pub fn edge_uri(source_uri: &str, dest_uri: &str, attrs: &Attributes) -> String {
    let mut uri = format!(
        "source={}&destination={}",
        uri_hash(source_uri),
        uri_hash(dest_uri)
    );

    let mut visited = BTreeSet::new();
    let mut chain = RELATIONSHIP_ATTR;
    while let Some(next) = attrs.get(chain) {
        if !visited.insert(chain) {
            break;
        }
        uri.push_str(&format!("&{chain}={next}"));
        chain = next.as_str();
    }

    if let Some(origin) = attrs.get(ORIGIN_ATTR) {
        uri.push_str(&format!("&{ORIGIN_ATTR}={origin}"));
    }
    uri
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn node_uri_layout() {
        assert_eq!(
            node_uri("attribute", "domain", "example.com"),
            "class=attribute&key=domain&value=example.com"
        );
    }

    #[test]
    fn uri_hash_is_name_based_v3() {
        let hash = uri_hash("class=attribute&key=domain&value=example.com");
        let parsed = Uuid::parse_str(&hash).expect("hyphenated uuid");

        assert_eq!(parsed.get_version_num(), 3);
        assert_eq!(hash, uri_hash("class=attribute&key=domain&value=example.com"));
        assert_ne!(hash, uri_hash("class=attribute&key=domain&value=example.org"));
    }

    #[test]
    fn edge_uri_single_step_chain() {
        let source = node_uri("attribute", "domain", "example.com");
        let dest = node_uri("attribute", "ip", "93.184.216.34");
        let uri = edge_uri(
            &source,
            &dest,
            &attrs(&[("relationship", "describedBy"), ("origin", "dns")]),
        );

        assert_eq!(
            uri,
            format!(
                "source={}&destination={}&relationship=describedBy&origin=dns",
                uri_hash(&source),
                uri_hash(&dest)
            )
        );
    }

    #[test]
    fn edge_uri_follows_chain() {
        let uri = edge_uri(
            "a",
            "b",
            &attrs(&[
                ("relationship", "describedBy"),
                ("describedBy", "nameserver"),
                ("origin", "dns"),
            ]),
        );
        assert!(uri.ends_with("&relationship=describedBy&describedBy=nameserver&origin=dns"));
    }

    #[test]
    fn edge_uri_cycle_terminates() {
        let uri = edge_uri(
            "a",
            "b",
            &attrs(&[("relationship", "loop"), ("loop", "relationship")]),
        );
        assert!(uri.ends_with("&relationship=loop&loop=relationship"));
    }

    #[test]
    fn edge_uri_without_relationship_or_origin() {
        let uri = edge_uri("a", "b", &Attributes::new());
        assert_eq!(
            uri,
            format!("source={}&destination={}", uri_hash("a"), uri_hash("b"))
        );
    }
}
