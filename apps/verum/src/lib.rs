//! # verum
//!
//! Library half of the Verum binary: command-line definitions, settings and
//! descriptor loading, and the Neo4j store connector.

pub mod cli;
pub mod config;
pub mod neo4j;
