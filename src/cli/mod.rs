//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `autohunt run` - Execute an orchestrated pipeline run
//! - `autohunt scan <tool>` - Run one tool's scan pool standalone
//! - `autohunt clean <path>...` - Apply cleaning templates to raw artifacts
//! - `autohunt store [<path>...]` - Ingest cleaned files into the database
//! - `autohunt scopes insert|list` - Manage recorded scopes

mod clean;
mod run;
mod scan;
mod scopes;
mod store;

pub use clean::CleanCommand;
pub use run::RunCommand;
pub use scan::ScanCommand;
pub use scopes::{ScopesCommand, ScopesSubcommand};
pub use store::StoreCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autohunt - automated reconnaissance pipeline.
///
/// Collects targets, runs external scan tools over them concurrently,
/// normalizes raw output via regex templates, and persists cleaned rows
/// into a queryable store.
#[derive(Parser, Debug)]
#[command(name = "autohunt")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated reconnaissance pipeline", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute an orchestrated pipeline run
    #[command(alias = "r")]
    Run(RunCommand),

    /// Run one tool's scan pool over the target list
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Apply cleaning templates to raw artifacts
    #[command(alias = "c")]
    Clean(CleanCommand),

    /// Ingest cleaned files into the database
    Store(StoreCommand),

    /// Manage recorded scopes
    Scopes(ScopesCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Plain
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
