//! # Component Registry
//!
//! Maps component names to constructors. Resolved once at startup: each
//! configuration record is validated, matched to a constructor of its kind,
//! and built. Records that fail any step are logged and left out of the
//! pipeline; nothing misconfigured ever runs.

use crate::VerumError;
use crate::config::{ComponentConfig, ComponentKind, Descriptor};
use crate::enrichment::{DnsEnricher, Enricher, SystemResolver};
use crate::merge::{GraphSink, MergeEngine};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Builds an enricher from its record and validated descriptor.
pub type EnricherConstructor =
    fn(&ComponentConfig, Descriptor) -> Result<Box<dyn Enricher>, VerumError>;

/// Builds a graph sink from its record.
pub type SinkConstructor = fn(&ComponentConfig) -> Result<Box<dyn GraphSink>, VerumError>;

/// Registry name of the DNS enricher.
pub const DNS_COMPONENT: &str = "dns";

/// Registry name of the in-memory context graph sink.
pub const CONTEXT_GRAPH_COMPONENT: &str = "context-graph";

fn build_dns(
    _config: &ComponentConfig,
    descriptor: Descriptor,
) -> Result<Box<dyn Enricher>, VerumError> {
    let resolver = SystemResolver::new()?;
    Ok(Box::new(DnsEnricher::with_descriptor(resolver, descriptor)))
}

fn build_context_graph(config: &ComponentConfig) -> Result<Box<dyn GraphSink>, VerumError> {
    Ok(Box::new(MergeEngine::from_config(config)))
}

/// Name → constructor tables, one per capability.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    enrichers: BTreeMap<String, EnricherConstructor>,
    sinks: BTreeMap<String, SinkConstructor>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in components.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_enricher(DNS_COMPONENT, build_dns);
        registry.register_sink(CONTEXT_GRAPH_COMPONENT, build_context_graph);
        registry
    }

    pub fn register_enricher(&mut self, name: &str, constructor: EnricherConstructor) {
        self.enrichers.insert(name.to_string(), constructor);
    }

    pub fn register_sink(&mut self, name: &str, constructor: SinkConstructor) {
        self.sinks.insert(name.to_string(), constructor);
    }

    /// Build one component.
    pub fn build(&self, config: &ComponentConfig) -> Result<Component, VerumError> {
        let descriptor = config.validate()?;
        let unknown =
            || VerumError::UnknownComponent(format!("{} '{}'", descriptor.kind, config.name));
        match descriptor.kind {
            ComponentKind::Enrichment => {
                let constructor = self.enrichers.get(&config.name).ok_or_else(unknown)?;
                let enricher = constructor(config, descriptor.clone())?;
                Ok(Component::Enricher(descriptor, enricher))
            }
            ComponentKind::Interface => {
                let constructor = self.sinks.get(&config.name).ok_or_else(unknown)?;
                Ok(Component::Sink(descriptor, constructor(config)?))
            }
        }
    }

    /// Build every component, excluding the ones that fail.
    pub fn resolve(&self, configs: &[ComponentConfig]) -> Pipeline {
        let mut pipeline = Pipeline::default();
        for config in configs {
            match self.build(config) {
                Ok(Component::Enricher(descriptor, enricher)) => {
                    info!(name = %descriptor.name, "enricher configured");
                    pipeline.enrichers.push((descriptor, enricher));
                }
                Ok(Component::Sink(descriptor, sink)) => {
                    info!(name = %descriptor.name, "sink configured");
                    pipeline.sinks.push((descriptor, sink));
                }
                Err(e) => {
                    error!(name = %config.name, error = %e, "component failed to configure, excluded");
                    pipeline.failures.push((config.name.clone(), e));
                }
            }
        }
        pipeline
    }
}

/// A built component and its descriptor.
pub enum Component {
    Enricher(Descriptor, Box<dyn Enricher>),
    Sink(Descriptor, Box<dyn GraphSink>),
}

/// The components that configured successfully, and the ones that did not.
#[derive(Default)]
pub struct Pipeline {
    pub enrichers: Vec<(Descriptor, Box<dyn Enricher>)>,
    pub sinks: Vec<(Descriptor, Box<dyn GraphSink>)>,
    pub failures: Vec<(String, VerumError)>,
}

impl Pipeline {
    pub fn enricher(&self, name: &str) -> Option<&dyn Enricher> {
        self.enrichers
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, e)| e.as_ref())
    }

    /// Enrichers accepting observables of `kind`, cheapest first.
    pub fn enrichers_for(&self, kind: &str) -> Vec<&dyn Enricher> {
        let mut matching: Vec<_> = self
            .enrichers
            .iter()
            .filter(|(d, _)| d.accepts(kind))
            .collect();
        matching.sort_by_key(|(d, _)| (d.approx_cost, d.approx_speed));
        matching.into_iter().map(|(_, e)| e.as_ref()).collect()
    }

    pub fn sink_mut(&mut self, name: &str) -> Option<&mut (dyn GraphSink + 'static)> {
        self.sinks
            .iter_mut()
            .find(|(d, _)| d.name == name)
            .map(|(_, s)| s.as_mut())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "enrichers",
                &self.enrichers.iter().map(|(d, _)| &d.name).collect::<Vec<_>>(),
            )
            .field(
                "sinks",
                &self.sinks.iter().map(|(d, _)| &d.name).collect::<Vec<_>>(),
            )
            .field("failures", &self.failures)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subgraph;
    use crate::time::StartTime;

    struct Echo(Descriptor);

    impl Enricher for Echo {
        fn produce(&self, observable: &str, start_time: Option<&StartTime>) -> Subgraph {
            let mut subgraph = Subgraph::new();
            subgraph.add_node(crate::Node::new(
                "attribute",
                "domain",
                observable,
                StartTime::resolve(start_time),
            ));
            subgraph
        }

        fn describe(&self) -> Descriptor {
            self.0.clone()
        }
    }

    fn build_echo(
        _config: &ComponentConfig,
        descriptor: Descriptor,
    ) -> Result<Box<dyn Enricher>, VerumError> {
        Ok(Box::new(Echo(descriptor)))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_enricher("echo", build_echo);
        registry.register_sink(CONTEXT_GRAPH_COMPONENT, build_context_graph);
        registry
    }

    fn echo_config(cost: u8) -> ComponentConfig {
        ComponentConfig {
            inputs: vec!["domain".to_string()],
            cost: Some(cost),
            ..ComponentConfig::named("echo", ComponentKind::Enrichment)
        }
    }

    #[test]
    fn misconfigured_components_are_excluded() {
        let configs = vec![
            echo_config(2),
            ComponentConfig {
                kind: None,
                ..echo_config(1)
            },
            ComponentConfig::named("missing", ComponentKind::Enrichment),
            ComponentConfig::named("nowhere", ComponentKind::Interface),
            ComponentConfig::named(CONTEXT_GRAPH_COMPONENT, ComponentKind::Interface),
        ];

        let pipeline = registry().resolve(&configs);
        assert_eq!(pipeline.enrichers.len(), 1);
        assert_eq!(pipeline.sinks.len(), 1);
        assert_eq!(pipeline.failures.len(), 3);
        assert!(
            pipeline
                .failures
                .iter()
                .any(|(_, e)| matches!(e, VerumError::UnknownComponent(_)))
        );
    }

    #[test]
    fn enricher_lookup_by_name_and_kind() {
        let pipeline = registry().resolve(&[echo_config(4)]);
        assert!(pipeline.enricher("echo").is_some());
        assert_eq!(pipeline.enrichers_for("DOMAIN").len(), 1);
        assert!(pipeline.enrichers_for("ip").is_empty());

        let subgraph = pipeline
            .enricher("echo")
            .map(|e| e.produce("example.com", None))
            .unwrap_or_default();
        assert_eq!(subgraph.node_count(), 1);
    }

    #[test]
    fn sink_is_reachable_mutably() {
        let mut pipeline = registry().resolve(&[ComponentConfig::named(
            CONTEXT_GRAPH_COMPONENT,
            ComponentKind::Interface,
        )]);
        let sink = pipeline.sink_mut(CONTEXT_GRAPH_COMPONENT).expect("sink");
        let mut subgraph = Subgraph::new();
        subgraph.add_node(crate::Node::bare("x"));
        sink.merge(&subgraph);
        assert_eq!(sink.graph().node_count(), 1);
    }

    #[test]
    fn builtins_include_dns_and_context_graph() {
        let registry = Registry::with_builtins();
        assert!(registry.enrichers.contains_key(DNS_COMPONENT));
        assert!(registry.sinks.contains_key(CONTEXT_GRAPH_COMPONENT));
    }
}
