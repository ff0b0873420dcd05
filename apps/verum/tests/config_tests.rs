//! Settings and descriptor loading, resolved through the component registry.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use verum::cli::build_pipeline;
use verum::config::{Settings, load_descriptors};
use verum_core::VerumError;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write");
    path
}

fn plugin_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write(
        dir.path(),
        "dns.toml",
        "type = \"enrichment\"\ninputs = [\"domain\"]\ncost = 3\nspeed = 2\n",
    );
    write(
        dir.path(),
        "context-graph.toml",
        "type = \"interface\"\n",
    );
    dir
}

// =============================================================================
// DESCRIPTOR FILES
// =============================================================================

#[test]
fn descriptors_take_their_name_from_the_file() {
    let dir = plugin_dir();
    write(dir.path(), "README.md", "not a descriptor");

    let descriptors = load_descriptors(dir.path()).expect("load");
    let names: Vec<&str> = descriptors
        .configs
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, ["context-graph", "dns"]);
    assert!(descriptors.unreadable.is_empty());
}

#[test]
fn unparseable_descriptor_is_reported_not_fatal() {
    let dir = plugin_dir();
    write(dir.path(), "broken.toml", "type = [unterminated");

    let descriptors = load_descriptors(dir.path()).expect("load");
    assert_eq!(descriptors.configs.len(), 2);
    assert_eq!(descriptors.unreadable.len(), 1);
    assert!(matches!(
        descriptors.unreadable[0].1,
        VerumError::Configuration(_)
    ));
}

#[test]
fn explicit_name_wins_over_file_stem() {
    let dir = TempDir::new().expect("tempdir");
    write(
        dir.path(),
        "resolver.toml",
        "name = \"dns\"\ntype = \"enrichment\"\ninputs = [\"domain\"]\n",
    );
    let descriptors = load_descriptors(dir.path()).expect("load");
    assert_eq!(descriptors.configs[0].name, "dns");
}

// =============================================================================
// SETTINGS
// =============================================================================

#[test]
fn settings_file_is_read() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        dir.path(),
        "verum.toml",
        "[core]\nplugins = \"p\"\ncontext_graph_file = \"g.gml\"\n\n\
         [store]\nhost = \"graph.local\"\nport = 7475\nuser = \"neo4j\"\npassword = \"pw\"\n",
    );

    let settings = Settings::load(Some(&path)).expect("load");
    assert_eq!(settings.plugin_dir(), PathBuf::from("p"));
    assert_eq!(settings.context_graph_file(), PathBuf::from("g.gml"));
    assert_eq!(settings.store.host.as_deref(), Some("graph.local"));
    assert_eq!(settings.store.port, Some(7475));
}

#[test]
fn named_settings_file_must_exist() {
    let dir = TempDir::new().expect("tempdir");
    assert!(matches!(
        Settings::load(Some(&dir.path().join("absent.toml"))),
        Err(VerumError::Configuration(_))
    ));
}

#[test]
fn store_settings_fill_descriptors() {
    let dir = plugin_dir();
    let settings = Settings::from_toml("[store]\nhost = \"graph.local\"\nport = 7475\n")
        .expect("parse")
        .with_overrides(Some(dir.path().to_path_buf()), None);

    let descriptors = settings.components().expect("components");
    for config in &descriptors.configs {
        assert_eq!(config.store_host.as_deref(), Some("graph.local"));
        assert_eq!(config.store_port.as_deref(), Some("7475"));
        assert_eq!(
            config.store_endpoint().as_deref(),
            Some("http://graph.local:7475/db/data/")
        );
    }
    let sink = descriptors
        .configs
        .iter()
        .find(|c| c.name == "context-graph")
        .expect("sink");
    assert_eq!(
        sink.context_graph_file,
        Some(PathBuf::from("context.graphml"))
    );
}

#[test]
fn missing_plugin_dir_falls_back_to_builtins() {
    let dir = TempDir::new().expect("tempdir");
    let settings = Settings::default().with_overrides(Some(dir.path().join("nowhere")), None);
    let descriptors = settings.components().expect("components");
    assert_eq!(descriptors.configs.len(), 2);
}

// =============================================================================
// PIPELINE
// =============================================================================

#[test]
fn misconfigured_descriptors_are_excluded() {
    let dir = plugin_dir();
    write(dir.path(), "untyped.toml", "inputs = [\"domain\"]\n");
    write(dir.path(), "whois.toml", "type = \"enrichment\"\n");
    write(dir.path(), "broken.toml", "type = [");
    let graph = dir.path().join("master.gml");

    let settings = Settings::default().with_overrides(Some(dir.path().to_path_buf()), Some(graph));
    let mut pipeline = build_pipeline(&settings).expect("pipeline");

    assert_eq!(pipeline.enrichers.len(), 1);
    assert_eq!(pipeline.sinks.len(), 1);
    let mut failed: Vec<&str> = pipeline.failures.iter().map(|(n, _)| n.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed.len(), 3);
    assert!(failed.contains(&"untyped"));
    assert!(failed.contains(&"whois"));

    assert!(pipeline.enricher("dns").is_some());
    let sink = pipeline.sink_mut("context-graph").expect("sink");
    assert!(sink.graph().is_empty());
    sink.persist_default().expect("persist");
    assert!(dir.path().join("master.gml").is_file());
}
