//! Store subcommand implementation.
//!
//! Ingests cleaned files into the configured database, one transaction per
//! file.

use anyhow::bail;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use crate::cleaner::CLEAN_MARKER;
use crate::config::Settings;
use crate::output;
use crate::registry::TemplateRegistry;
use crate::store::Store;

/// Ingest cleaned files into the database.
#[derive(Parser, Debug)]
pub struct StoreCommand {
    /// Cleaned files or directories (defaults to the cleaned directory)
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Create destination tables from the registry before ingesting
    #[arg(long)]
    pub init_schema: bool,
}

impl StoreCommand {
    /// Execute the store command.
    pub async fn execute(&self, settings: &Settings, quiet: bool) -> anyhow::Result<()> {
        let registry = TemplateRegistry::from_file(&settings.paths.registry_file)?;
        let store = Store::connect(&settings.database).await?;

        if self.init_schema {
            store.init_schema(&registry).await?;
            if !quiet {
                output::print_info("schema initialized from the template registry");
            }
        }

        let roots = if self.paths.is_empty() {
            vec![settings.paths.cleaned_dir.clone()]
        } else {
            self.paths.clone()
        };

        let mut files = Vec::new();
        for root in &roots {
            if root.is_dir() {
                for entry in fs::read_dir(root)?.flatten() {
                    let p = entry.path();
                    let is_cleaned = entry.file_name().to_string_lossy().contains(CLEAN_MARKER);
                    if p.is_file() && is_cleaned {
                        files.push(p);
                    }
                }
            } else {
                files.push(root.clone());
            }
        }

        if files.is_empty() {
            bail!("no cleaned files to ingest");
        }

        let mut failed = 0usize;
        for file in &files {
            match store.ingest_file(file, &registry).await {
                Ok(report) => {
                    if !quiet {
                        output::print_success(&format!(
                            "{} -> table {} ({} rows)",
                            file.display(),
                            report.table,
                            report.rows
                        ));
                    }
                }
                Err(e) => {
                    output::print_error(&e.to_string());
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{failed} of {} file(s) failed to ingest", files.len());
        }
        Ok(())
    }
}
