//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::StoreKind;
use crate::config::Settings;
use crate::neo4j::Neo4jStore;
use std::path::Path;
use tracing::info;
use verum_core::registry::CONTEXT_GRAPH_COMPONENT;
use verum_core::{
    Enricher, GraphSink, ImportReport, Importer, Pipeline, RedbStore, Registry, StartTime,
    Subgraph, TransactionalStore, VerumError, load_graph, persist_graph,
};

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Resolve every configured component.
///
/// Descriptor files that could not be parsed are reported with the
/// components that failed to configure.
pub fn build_pipeline(settings: &Settings) -> Result<Pipeline, VerumError> {
    let descriptors = settings.components()?;
    let mut pipeline = Registry::with_builtins().resolve(&descriptors.configs);
    pipeline.failures.extend(
        descriptors
            .unreadable
            .into_iter()
            .map(|(path, e)| (path.display().to_string(), e)),
    );
    Ok(pipeline)
}

fn context_sink(pipeline: &mut Pipeline) -> Result<&mut (dyn GraphSink + 'static), VerumError> {
    pipeline.sink_mut(CONTEXT_GRAPH_COMPONENT).ok_or_else(|| {
        VerumError::Configuration(format!("'{CONTEXT_GRAPH_COMPONENT}' is not configured"))
    })
}

/// Open the store an import goes to.
pub fn open_store(
    settings: &Settings,
    kind: StoreKind,
) -> Result<Box<dyn TransactionalStore>, VerumError> {
    match kind {
        StoreKind::Redb => Ok(Box::new(RedbStore::open(settings.redb_path())?)),
        StoreKind::Neo4j => Ok(Box::new(Neo4jStore::from_settings(&settings.store)?)),
    }
}

fn import_into(
    settings: &Settings,
    kind: StoreKind,
    subgraph: &Subgraph,
) -> Result<ImportReport, VerumError> {
    let mut store = open_store(settings, kind)?;
    Importer::new(store.as_mut()).import(subgraph)
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// ENRICH COMMAND
// =============================================================================

/// Arguments of `verum enrich`.
#[derive(Debug, Clone)]
pub struct EnrichRequest {
    pub observable: String,
    pub kind: String,
    pub enricher: Option<String>,
    pub start_time: Option<String>,
    /// Store to import the subgraph into, if any.
    pub import: Option<StoreKind>,
}

/// Enrich one observable, merge it and persist the master graph.
pub fn cmd_enrich(
    settings: &Settings,
    json_mode: bool,
    request: &EnrichRequest,
) -> Result<(), VerumError> {
    let mut pipeline = build_pipeline(settings)?;

    let enricher: &dyn Enricher = match &request.enricher {
        Some(name) => pipeline.enricher(name),
        None => pipeline.enrichers_for(&request.kind).into_iter().next(),
    }
    .ok_or_else(|| {
        VerumError::UnknownComponent(format!(
            "no enricher for '{}'",
            request.enricher.as_deref().unwrap_or(&request.kind)
        ))
    })?;
    let name = enricher.describe().name;

    let start_time = request.start_time.clone().map(StartTime::from);
    let subgraph = enricher.produce(&request.observable, start_time.as_ref());
    info!(
        enricher = %name,
        observable = %request.observable,
        nodes = subgraph.node_count(),
        edges = subgraph.edge_count(),
        "enriched"
    );

    let sink = context_sink(&mut pipeline)?;
    let stats = sink.merge(&subgraph);
    sink.persist_default()?;
    let (total_nodes, total_edges) = (sink.graph().node_count(), sink.graph().edge_count());

    let report = match request.import {
        Some(kind) => Some(import_into(settings, kind, &subgraph)?),
        None => None,
    };

    if json_mode {
        print_json(&serde_json::json!({
            "observable": request.observable,
            "enricher": name,
            "nodes": subgraph.node_count(),
            "edges": subgraph.edge_count(),
            "nodes_added": stats.nodes_added,
            "edges_added": stats.edges_added,
            "graph_nodes": total_nodes,
            "graph_edges": total_edges,
            "imported_nodes": report.as_ref().map(|r| r.node_map.len()),
            "imported_edges": report.as_ref().map(|r| r.edges_created),
        }));
        return Ok(());
    }

    println!("Enriched {} with {}", request.observable, name);
    println!(
        "  Subgraph:   {} nodes, {} edges",
        subgraph.node_count(),
        subgraph.edge_count()
    );
    println!("  New nodes:  {}", stats.nodes_added);
    println!("  Graph:      {total_nodes} nodes, {total_edges} edges");
    if let Some(report) = report {
        println!(
            "  Imported:   {} nodes, {} edges",
            report.node_map.len(),
            report.edges_created
        );
    }
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Bulk-import a graph file into a store.
pub fn cmd_import(
    settings: &Settings,
    json_mode: bool,
    file: &Path,
    kind: StoreKind,
) -> Result<(), VerumError> {
    let graph = load_graph(file)?;
    let report = import_into(settings, kind, &Subgraph::from(&graph))?;

    if json_mode {
        print_json(&serde_json::json!({
            "file": file.to_string_lossy(),
            "store": format!("{kind:?}").to_lowercase(),
            "nodes": report.node_map.len(),
            "edges": report.edges_created,
        }));
        return Ok(());
    }

    println!("Imported {}", file.display());
    println!("  Nodes: {}", report.node_map.len());
    println!("  Edges: {}", report.edges_created);
    Ok(())
}

// =============================================================================
// CONVERT COMMAND
// =============================================================================

/// Read a graph in one format and write it in another.
pub fn cmd_convert(json_mode: bool, input: &Path, output: &Path) -> Result<(), VerumError> {
    let graph = load_graph(input)?;
    persist_graph(&graph, output)?;

    if json_mode {
        print_json(&serde_json::json!({
            "input": input.to_string_lossy(),
            "output": output.to_string_lossy(),
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
        }));
        return Ok(());
    }

    println!(
        "Converted {} -> {} ({} nodes, {} edges)",
        input.display(),
        output.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show master graph status.
pub fn cmd_status(settings: &Settings, json_mode: bool) -> Result<(), VerumError> {
    let mut pipeline = build_pipeline(settings)?;
    let graph = context_sink(&mut pipeline)?.graph();
    let file = settings.context_graph_file();

    if json_mode {
        print_json(&serde_json::json!({
            "context_graph_file": file.to_string_lossy(),
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
        }));
        return Ok(());
    }

    println!("Verum Graph Status");
    println!("==================");
    println!("Graph file: {}", file.display());
    println!();
    println!("Nodes: {}", graph.node_count());
    println!("Edges: {}", graph.edge_count());
    Ok(())
}

// =============================================================================
// PLUGINS COMMAND
// =============================================================================

/// List configured components and the ones that failed.
pub fn cmd_plugins(settings: &Settings, json_mode: bool) -> Result<(), VerumError> {
    let pipeline = build_pipeline(settings)?;
    let descriptors = pipeline
        .enrichers
        .iter()
        .map(|(d, _)| d)
        .chain(pipeline.sinks.iter().map(|(d, _)| d));

    if json_mode {
        let configured: Vec<_> = descriptors
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "type": d.kind.to_string(),
                    "inputs": d.accepted_input_kinds,
                    "cost": d.approx_cost,
                    "speed": d.approx_speed,
                })
            })
            .collect();
        let failed: Vec<_> = pipeline
            .failures
            .iter()
            .map(|(name, e)| serde_json::json!({ "name": name, "error": e.to_string() }))
            .collect();
        print_json(&serde_json::json!({ "configured": configured, "failed": failed }));
        return Ok(());
    }

    println!("Configured components");
    println!("=====================");
    for d in descriptors {
        let inputs: Vec<&str> = d.accepted_input_kinds.iter().map(String::as_str).collect();
        println!(
            "  {:<16} {:<11} cost {:>2}  speed {:>2}  inputs [{}]",
            d.name,
            d.kind,
            d.approx_cost,
            d.approx_speed,
            inputs.join(", ")
        );
    }
    if !pipeline.failures.is_empty() {
        println!();
        println!("Failed to configure");
        println!("===================");
        for (name, e) in &pipeline.failures {
            println!("  {name}: {e}");
        }
    }
    Ok(())
}
