//! # Component Configuration
//!
//! The resolved configuration record handed to every component constructor.
//! Records are built once by the loader (the binary reads them from TOML
//! descriptor files) and passed by reference; nothing here is global.

use crate::VerumError;
use crate::primitives::{MAX_RATING, MIN_RATING};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// COMPONENT KIND
// =============================================================================

/// The capability a component provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    /// Produces subgraphs from observables.
    Enrichment,
    /// Accepts subgraphs into a graph store.
    Interface,
}

impl FromStr for ComponentKind {
    type Err = VerumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enrichment" => Ok(Self::Enrichment),
            "interface" => Ok(Self::Interface),
            other => Err(VerumError::Configuration(format!(
                "unknown component type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enrichment => write!(f, "enrichment"),
            Self::Interface => write!(f, "interface"),
        }
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// What a configured component says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Registry name of the component.
    pub name: String,
    pub kind: ComponentKind,
    /// Observable kinds accepted (e.g. `domain`), lower-cased.
    pub accepted_input_kinds: BTreeSet<String>,
    /// Resource cost, 1 (low) to 10.
    pub approx_cost: u8,
    /// Speed, 1 (fast) to 10.
    pub approx_speed: u8,
}

impl Descriptor {
    #[must_use]
    pub fn accepts(&self, kind: &str) -> bool {
        self.accepted_input_kinds.contains(&kind.to_ascii_lowercase())
    }
}

// =============================================================================
// CONFIGURATION RECORD
// =============================================================================

/// Configuration record for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Registry name used to find the component's constructor.
    pub name: String,
    /// `enrichment` or `interface`; required.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Accepted observable kinds; required for enrichers.
    pub inputs: Vec<String>,
    pub cost: Option<u8>,
    pub speed: Option<u8>,
    /// Graph file a sink loads at startup and persists to by default.
    pub context_graph_file: Option<PathBuf>,
    pub store_host: Option<String>,
    pub store_port: Option<String>,
}

impl ComponentConfig {
    /// A record with only a name and type.
    #[must_use]
    pub fn named(name: &str, kind: ComponentKind) -> Self {
        Self {
            name: name.to_string(),
            kind: Some(kind.to_string()),
            ..Self::default()
        }
    }

    /// Check the record and produce the component's descriptor.
    ///
    /// Fails when `type` is missing or unknown, when an enricher lists no
    /// inputs, or when cost/speed fall outside 1-10. A missing cost or speed
    /// is taken as the worst rating.
    pub fn validate(&self) -> Result<Descriptor, VerumError> {
        let kind: ComponentKind = self
            .kind
            .as_deref()
            .ok_or_else(|| {
                VerumError::Configuration(format!("'{}': 'type' not specified", self.name))
            })?
            .parse()?;

        let accepted_input_kinds: BTreeSet<String> = self
            .inputs
            .iter()
            .map(|input| input.trim().to_ascii_lowercase())
            .filter(|input| !input.is_empty())
            .collect();
        if kind == ComponentKind::Enrichment && accepted_input_kinds.is_empty() {
            return Err(VerumError::Configuration(format!(
                "'{}': no input types specified",
                self.name
            )));
        }

        Ok(Descriptor {
            name: self.name.clone(),
            kind,
            accepted_input_kinds,
            approx_cost: rating(&self.name, "cost", self.cost)?,
            approx_speed: rating(&self.name, "speed", self.speed)?,
        })
    }

    /// Legacy REST endpoint of the configured store, if host and port are set.
    #[must_use]
    pub fn store_endpoint(&self) -> Option<String> {
        match (&self.store_host, &self.store_port) {
            (Some(host), Some(port)) => Some(format!("http://{host}:{port}/db/data/")),
            _ => None,
        }
    }
}

fn rating(name: &str, field: &str, value: Option<u8>) -> Result<u8, VerumError> {
    match value {
        None => Ok(MAX_RATING),
        Some(v) if (MIN_RATING..=MAX_RATING).contains(&v) => Ok(v),
        Some(v) => Err(VerumError::Configuration(format!(
            "'{name}': {field} {v} outside {MIN_RATING}-{MAX_RATING}"
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================
