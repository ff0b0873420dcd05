//! # Merge Engine Tests
//!
//! End-to-end flow through the public API: enrich an observable, merge the
//! result into a master graph, write it to disk in every format, read it
//! back, and import it into the embedded store.

use std::collections::BTreeMap;
use std::net::IpAddr;
use tempfile::TempDir;
use verum_core::enrichment::{DnsResolver, Resolution};
use verum_core::{
    ComponentConfig, ComponentKind, ContextGraph, DnsEnricher, Enricher, GraphFormat, GraphSink,
    Importer, MergeEngine, RedbStore, StartTime, Subgraph, load_graph, persist_graph,
};

/// Resolver answering from fixed tables.
#[derive(Default)]
struct TableResolver {
    addresses: BTreeMap<String, Vec<IpAddr>>,
    nameservers: BTreeMap<String, Vec<String>>,
}

impl DnsResolver for TableResolver {
    fn lookup_ip(&self, host: &str) -> Resolution<Vec<IpAddr>> {
        self.addresses
            .get(host)
            .map_or(Resolution::Absent, |a| Resolution::Found(a.clone()))
    }

    fn lookup_ns(&self, domain: &str) -> Resolution<Vec<String>> {
        self.nameservers
            .get(domain)
            .map_or(Resolution::Absent, |n| Resolution::Found(n.clone()))
    }
}

fn enricher() -> DnsEnricher<TableResolver> {
    let mut resolver = TableResolver::default();
    for (domain, ip) in [("example.com", "93.184.216.34"), ("example.org", "93.184.216.35")] {
        resolver
            .addresses
            .insert(domain.to_string(), vec![ip.parse().expect("ip")]);
        resolver.nameservers.insert(
            domain.to_string(),
            vec!["a.iana-servers.net".to_string(), "b.iana-servers.net".to_string()],
        );
    }
    DnsEnricher::new(resolver)
}

fn enrich(domain: &str) -> Subgraph {
    let start = StartTime::Text("2014-11-01T10:34:00Z".to_string());
    enricher().produce(domain, Some(&start))
}

fn master_graph() -> ContextGraph {
    let mut engine = MergeEngine::new();
    engine.merge(&enrich("example.com"));
    engine.merge(&enrich("example.org"));
    engine.into_graph()
}

// =============================================================================
// MERGE
// =============================================================================

#[test]
fn overlapping_enrichments_share_nodes() {
    let graph = master_graph();

    // Two observables, two addresses, two shared nameservers, one shared
    // enrichment node.
    assert_eq!(graph.node_count(), 7);
    assert_eq!(graph.edge_count(), 8);
    assert!(graph.contains_node("class=attribute&key=enrichment&value=dns"));
}

#[test]
fn repeated_enrichment_appends_edges() {
    let mut engine = MergeEngine::new();
    let subgraph = enrich("example.com");
    engine.merge(&subgraph);
    let stats = engine.merge(&subgraph);

    assert_eq!(stats.nodes_added, 0);
    assert_eq!(engine.graph().node_count(), 5);
    assert_eq!(engine.graph().edge_count(), 8);
    assert_eq!(
        engine
            .graph()
            .edges_between(
                "class=attribute&key=domain&value=example.com",
                "class=attribute&key=ip&value=93.184.216.34",
            )
            .count(),
        2
    );
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[test]
fn every_extension_roundtrips_through_disk() {
    let dir = TempDir::new().expect("tempdir");
    let graph = master_graph();

    for format in GraphFormat::ALL {
        let path = dir.path().join(format!("context.{}", format.extension()));
        persist_graph(&graph, &path).expect("persist");
        let loaded = load_graph(&path).expect("load");
        assert_eq!(loaded, graph, "{format}");
    }
}

#[test]
fn unknown_extension_writes_graphml_and_loads_empty() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("context.dat");
    let graph = master_graph();

    persist_graph(&graph, &path).expect("persist");
    let written = std::fs::read_to_string(&path).expect("read");
    assert!(written.contains("<graphml"));

    let loaded = load_graph(&path).expect("load");
    assert!(loaded.is_empty());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().expect("tempdir");
    assert!(load_graph(&dir.path().join("absent.gml")).is_err());
}

#[test]
fn configured_sink_persists_to_its_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("context.gpickle");
    let config = ComponentConfig {
        context_graph_file: Some(path.clone()),
        ..ComponentConfig::named("context-graph", ComponentKind::Interface)
    };

    let mut engine = MergeEngine::from_config(&config);
    engine.merge(&enrich("example.com"));
    engine.persist_default().expect("persist");

    let reopened = MergeEngine::from_config(&config);
    assert_eq!(reopened.graph(), engine.graph());
    assert_eq!(reopened.load(&path).expect("load"), *engine.graph());
}

// =============================================================================
// IMPORT
// =============================================================================

#[test]
fn master_graph_imports_into_redb() {
    let dir = TempDir::new().expect("tempdir");
    let store = RedbStore::open(dir.path().join("store.redb")).expect("open");
    let graph = master_graph();

    let mut importer = Importer::new(store);
    let report = importer
        .import(&Subgraph::from(&graph))
        .expect("import");
    assert_eq!(report.node_map.len(), 7);
    assert_eq!(report.edges_created, 8);

    let store = importer.into_store();
    assert_eq!(store.node_count().expect("count"), 7);
    assert_eq!(store.edge_count().expect("count"), 8);
    assert_eq!(
        store
            .node_id("class=attribute&key=domain&value=example.com")
            .expect("lookup"),
        report
            .node_map
            .get("class=attribute&key=domain&value=example.com")
            .copied()
    );
}
