//! # Schema Primitives
//!
//! Fixed vocabulary and limits of the Verum context graph.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Every producer and sink agrees on them, which is what lets independently
//! produced subgraphs merge onto the same nodes.

/// Class shared by every observable and enrichment node.
pub const ATTRIBUTE_CLASS: &str = "attribute";

/// Key of the node that names which enrichment produced a fact.
pub const ENRICHMENT_KEY: &str = "enrichment";

/// Relationship used when an edge does not name one.
pub const DEFAULT_RELATIONSHIP: &str = "describedBy";

/// Attribute names with a fixed meaning on nodes and edges.
pub const CLASS_ATTR: &str = "class";
pub const KEY_ATTR: &str = "key";
pub const VALUE_ATTR: &str = "value";
pub const START_TIME_ATTR: &str = "start_time";
pub const URI_ATTR: &str = "uri";
pub const RELATIONSHIP_ATTR: &str = "relationship";
pub const ORIGIN_ATTR: &str = "origin";

/// Rendering of every `start_time` attribute.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Magic bytes for the binary graph snapshot header.
///
/// - File Header = Magic Bytes ("VRMG") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"VRMG";

/// Current binary snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;

/// Bounds for the cost and speed a component advertises.
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

/// Maximum number of statements in one store transaction.
///
/// A subgraph larger than this is rejected before the transaction opens.
pub const MAX_TRANSACTION_STATEMENTS: usize = 100_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"VRMG");
    }
}
