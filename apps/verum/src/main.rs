//! # Verum
//!
//! The command-line front end of the Verum context graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  apps/verum (THE BINARY)                 │
//! │                                                          │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │    CLI      │   │   Settings   │   │ Neo4j store  │   │
//! │  │   (clap)    │   │    (toml)    │   │  (reqwest)   │   │
//! │  └──────┬──────┘   └──────┬───────┘   └──────┬───────┘   │
//! │         └─────────────────┼──────────────────┘           │
//! │                           ▼                              │
//! │                   ┌───────────────┐                      │
//! │                   │  verum-core   │                      │
//! │                   │  (THE LOGIC)  │                      │
//! │                   └───────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! verum enrich example.com --start-time 2014-11-01T10:34:00Z
//! verum --graph context.gexf status
//! verum import context.graphml --store neo4j
//! verum convert context.graphml context.gml
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verum::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // VERUM_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("VERUM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.quiet {
        "verum=warn,verum_core=warn"
    } else {
        "verum=info,verum_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
