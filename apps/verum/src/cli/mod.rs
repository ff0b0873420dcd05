//! # Verum CLI Module
//!
//! This module implements the CLI interface for Verum.
//!
//! ## Available Commands
//!
//! - `enrich` - Enrich an observable and merge it into the master graph
//! - `import` - Bulk-import a graph file into a store
//! - `convert` - Rewrite a graph file in another format
//! - `status` - Show master graph status
//! - `plugins` - List configured components

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use verum_core::VerumError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Verum - context graph builder
///
/// Enriches observables, merges the results into one master graph and
/// federates it into graph stores.
#[derive(Parser, Debug)]
#[command(name = "verum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: ./verum.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of component descriptor files
    #[arg(short, long, global = true)]
    pub plugins: Option<PathBuf>,

    /// Master graph file; the extension selects the format
    #[arg(short = 'g', long, global = true)]
    pub graph: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Graph store targeted by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Embedded redb store at `[store] redb_path`
    #[default]
    Redb,
    /// Neo4j server at `[store] host:port`
    Neo4j,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enrich an observable and merge the result into the master graph
    Enrich {
        /// The observable, e.g. a domain name
        observable: String,

        /// Observable kind used to pick an enricher
        #[arg(short, long, default_value = "domain")]
        kind: String,

        /// Use this enricher instead of the cheapest one accepting `kind`
        #[arg(short, long)]
        enricher: Option<String>,

        /// When the facts were observed (ISO-8601); defaults to now
        #[arg(short = 't', long)]
        start_time: Option<String>,

        /// Also import the subgraph into a store
        #[arg(short, long)]
        import: bool,

        /// Store used with --import
        #[arg(short, long, value_enum, default_value_t = StoreKind::Redb)]
        store: StoreKind,
    },

    /// Bulk-import a graph file into a store
    Import {
        /// Graph file; the extension selects the format
        file: PathBuf,

        /// Target store
        #[arg(short, long, value_enum, default_value_t = StoreKind::Redb)]
        store: StoreKind,
    },

    /// Read a graph file and write it in another format
    Convert {
        /// Input graph file
        input: PathBuf,

        /// Output graph file
        output: PathBuf,
    },

    /// Show master graph status
    Status,

    /// List configured components and the ones that failed to configure
    Plugins,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), VerumError> {
    let settings = crate::config::Settings::load(cli.config.as_deref())?
        .with_overrides(cli.plugins, cli.graph);
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Enrich {
            observable,
            kind,
            enricher,
            start_time,
            import,
            store,
        }) => cmd_enrich(
            &settings,
            json_mode,
            &EnrichRequest {
                observable,
                kind,
                enricher,
                start_time,
                import: import.then_some(store),
            },
        ),
        Some(Commands::Import { file, store }) => cmd_import(&settings, json_mode, &file, store),
        Some(Commands::Convert { input, output }) => cmd_convert(json_mode, &input, &output),
        Some(Commands::Plugins) => cmd_plugins(&settings, json_mode),
        Some(Commands::Status) | None => cmd_status(&settings, json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn enrich_arguments_parse() {
        let cli = Cli::try_parse_from([
            "verum",
            "--graph",
            "g.gexf",
            "enrich",
            "example.com",
            "--import",
            "--store",
            "neo4j",
        ])
        .expect("parse");

        assert_eq!(cli.graph, Some(PathBuf::from("g.gexf")));
        match cli.command {
            Some(Commands::Enrich {
                observable,
                kind,
                import,
                store,
                ..
            }) => {
                assert_eq!(observable, "example.com");
                assert_eq!(kind, "domain");
                assert!(import);
                assert_eq!(store, StoreKind::Neo4j);
            }
            other => unreachable!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["verum", "--json-mode"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(cli.json_mode);
    }
}
