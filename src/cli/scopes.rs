//! Scopes subcommand implementation.
//!
//! Ad hoc insert/query of recorded scopes, outside a full pipeline run.

use clap::{Parser, Subcommand};

use crate::cli::OutputFormat;
use crate::config::Settings;
use crate::output;
use crate::registry::TemplateRegistry;
use crate::store::Store;

/// Manage recorded scopes.
#[derive(Parser, Debug)]
pub struct ScopesCommand {
    #[command(subcommand)]
    pub command: ScopesSubcommand,
}

/// Scope operations.
#[derive(Subcommand, Debug)]
pub enum ScopesSubcommand {
    /// Record a scope string for a platform
    Insert {
        /// Scope to record (e.g. "*.acme.com")
        #[arg(value_name = "SCOPE")]
        scope: String,

        /// Platform the scope belongs to
        #[arg(short, long)]
        platform: String,
    },

    /// List the scopes recorded for a platform
    List {
        /// Platform to query
        #[arg(short, long)]
        platform: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        output: OutputFormat,
    },
}

impl ScopesCommand {
    /// Execute the scopes command.
    pub async fn execute(&self, settings: &Settings, quiet: bool) -> anyhow::Result<()> {
        let store = Store::connect(&settings.database).await?;

        // The scopes table is part of the registry-driven schema; an empty
        // registry still yields the scopes table itself.
        let registry =
            TemplateRegistry::from_file(&settings.paths.registry_file).unwrap_or_default();
        store.init_schema(&registry).await?;

        match &self.command {
            ScopesSubcommand::Insert { scope, platform } => {
                store.insert_scope(platform, scope).await?;
                if !quiet {
                    output::print_success(&format!(
                        "scope '{scope}' recorded for platform '{platform}'"
                    ));
                }
            }
            ScopesSubcommand::List { platform, output } => {
                let scopes = store.list_scopes(platform).await?;
                output::print_scopes(platform, &scopes, *output)?;
            }
        }

        Ok(())
    }
}
