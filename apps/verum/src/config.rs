//! # Settings
//!
//! The main settings file and the per-component descriptor files.
//!
//! ```toml
//! [core]
//! plugins = "plugins"
//! context_graph_file = "context.graphml"
//!
//! [store]
//! host = "localhost"
//! port = 7474
//! user = "neo4j"
//! password = "secret"
//! redb_path = "verum.redb"
//! ```
//!
//! Every `*.toml` file in the plugin directory is one component record (see
//! [`ComponentConfig`]). Values a descriptor leaves empty are filled from the
//! `[store]` and `[core]` sections; command-line flags override both.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use verum_core::registry::{CONTEXT_GRAPH_COMPONENT, DNS_COMPONENT};
use verum_core::{ComponentConfig, ComponentKind, VerumError};

/// Settings file read when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "verum.toml";

/// Plugin directory used when neither the settings nor the CLI name one.
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Master graph file used when nothing names one.
pub const DEFAULT_CONTEXT_GRAPH_FILE: &str = "context.graphml";

/// Neo4j HTTP port used when `[store] port` is missing.
pub const DEFAULT_STORE_PORT: u16 = 7474;

// =============================================================================
// SETTINGS FILE
// =============================================================================

/// Contents of the main settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub core: CoreSettings,
    pub store: StoreSettings,
}

/// `[core]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// Directory holding component descriptor files.
    pub plugins: Option<PathBuf>,
    /// Master graph file of the context graph sink.
    pub context_graph_file: Option<PathBuf>,
}

/// `[store]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// File of the embedded store.
    pub redb_path: Option<PathBuf>,
}

impl Settings {
    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self, VerumError> {
        let content = fs::read_to_string(path).map_err(|e| {
            VerumError::Configuration(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, VerumError> {
        toml::from_str(content)
            .map_err(|e| VerumError::Configuration(format!("Failed to parse settings: {e}")))
    }

    /// Load the named settings file, or `verum.toml` if it exists, or defaults.
    ///
    /// A file named explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, VerumError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_SETTINGS_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    debug!("no settings file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, plugins: Option<PathBuf>, graph: Option<PathBuf>) -> Self {
        if plugins.is_some() {
            self.core.plugins = plugins;
        }
        if graph.is_some() {
            self.core.context_graph_file = graph;
        }
        self
    }

    #[must_use]
    pub fn plugin_dir(&self) -> PathBuf {
        self.core
            .plugins
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PLUGIN_DIR))
    }

    #[must_use]
    pub fn context_graph_file(&self) -> PathBuf {
        self.core
            .context_graph_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTEXT_GRAPH_FILE))
    }

    #[must_use]
    pub fn redb_path(&self) -> PathBuf {
        self.store
            .redb_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("verum.redb"))
    }

    /// Fill fields a descriptor left empty.
    ///
    /// The context graph sink always uses the `[core]` graph file when one
    /// was set on the command line or in the settings.
    pub fn fill(&self, config: &mut ComponentConfig) {
        if config.store_host.is_none() {
            config.store_host.clone_from(&self.store.host);
        }
        if config.store_port.is_none() {
            config.store_port = self.store.port.map(|p| p.to_string());
        }
        if config.name == CONTEXT_GRAPH_COMPONENT {
            match &self.core.context_graph_file {
                Some(file) => config.context_graph_file = Some(file.clone()),
                None if config.context_graph_file.is_none() => {
                    config.context_graph_file = Some(self.context_graph_file());
                }
                None => {}
            }
        }
    }

    /// Every component record, filled from these settings.
    ///
    /// Without a plugin directory the built-in components are used.
    pub fn components(&self) -> Result<Descriptors, VerumError> {
        let dir = self.plugin_dir();
        let mut descriptors = if dir.is_dir() {
            load_descriptors(&dir)?
        } else {
            warn!(path = %dir.display(), "plugin directory not found, using built-in components");
            Descriptors {
                configs: builtin_components(),
                unreadable: Vec::new(),
            }
        };
        for config in &mut descriptors.configs {
            self.fill(config);
        }
        Ok(descriptors)
    }
}

// =============================================================================
// DESCRIPTOR FILES
// =============================================================================

/// Component records read from a plugin directory.
#[derive(Debug, Default)]
pub struct Descriptors {
    pub configs: Vec<ComponentConfig>,
    /// Files that could not be read or parsed.
    pub unreadable: Vec<(PathBuf, VerumError)>,
}

/// Read every `*.toml` file in `dir`, in file name order.
///
/// A record without a `name` takes the file stem. A file that fails to parse
/// is reported in `unreadable` and does not stop the others.
pub fn load_descriptors(dir: &Path) -> Result<Descriptors, VerumError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut descriptors = Descriptors::default();
    for path in paths {
        match read_descriptor(&path) {
            Ok(config) => {
                debug!(path = %path.display(), name = %config.name, "descriptor loaded");
                descriptors.configs.push(config);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "descriptor not loaded");
                descriptors.unreadable.push((path, e));
            }
        }
    }
    Ok(descriptors)
}

fn read_descriptor(path: &Path) -> Result<ComponentConfig, VerumError> {
    let content = fs::read_to_string(path)?;
    let mut config: ComponentConfig = toml::from_str(&content)
        .map_err(|e| VerumError::Configuration(format!("Failed to parse descriptor: {e}")))?;
    if config.name.is_empty() {
        config.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(config)
}

/// Records for the components every installation ships with.
#[must_use]
pub fn builtin_components() -> Vec<ComponentConfig> {
    vec![
        ComponentConfig {
            inputs: vec!["domain".to_string()],
            cost: Some(3),
            speed: Some(2),
            ..ComponentConfig::named(DNS_COMPONENT, ComponentKind::Enrichment)
        },
        ComponentConfig::named(CONTEXT_GRAPH_COMPONENT, ComponentKind::Interface),
    ]
}

// =============================================================================
// TESTS
// =============================================================================
