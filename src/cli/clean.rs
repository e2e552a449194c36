//! Clean subcommand implementation.
//!
//! Applies cleaning templates to raw artifact files or directories.

use anyhow::bail;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use crate::cleaner::Cleaner;
use crate::config::Settings;
use crate::output;
use crate::registry::TemplateRegistry;

/// Apply cleaning templates to raw artifacts.
#[derive(Parser, Debug)]
pub struct CleanCommand {
    /// Raw artifact files or directories to sweep
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Template to apply (defaults to each tool's configured template)
    #[arg(short = 'T', long, value_name = "NAME")]
    pub template: Option<String>,
}

impl CleanCommand {
    /// Execute the clean command.
    pub fn execute(&self, settings: &Settings, quiet: bool) -> anyhow::Result<()> {
        let registry = TemplateRegistry::from_file(&settings.paths.registry_file)?;
        let cleaner = Cleaner::new(&registry, settings.paths.cleaned_dir.clone());

        let mut files = Vec::new();
        for path in &self.paths {
            if path.is_dir() {
                for entry in fs::read_dir(path)?.flatten() {
                    let p = entry.path();
                    let name = entry.file_name().to_string_lossy().into_owned();
                    // Directory sweeps only pick up registered artifacts.
                    if p.is_file() && registry.resolve_tool(&name).is_some() {
                        files.push(p);
                    }
                }
            } else {
                files.push(path.clone());
            }
        }

        if files.is_empty() {
            bail!("nothing to clean");
        }

        let mut failed = 0usize;
        for file in &files {
            let template = match &self.template {
                Some(name) => name.clone(),
                None => {
                    let name = file
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    match registry
                        .resolve_tool(&name)
                        .and_then(|tool| settings.tool(tool).ok())
                    {
                        Some(entry) => entry.template.clone(),
                        None => {
                            output::print_error(&format!(
                                "{}: no template configured; pass --template",
                                file.display()
                            ));
                            failed += 1;
                            continue;
                        }
                    }
                }
            };

            match cleaner.clean_file(file, &template) {
                Ok(cleaned) => {
                    if !quiet {
                        output::print_success(&format!(
                            "{} -> {} ({} rows)",
                            file.display(),
                            cleaned.path.display(),
                            cleaned.records
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
            bail!("{failed} of {} file(s) failed to clean", files.len());
        }
        Ok(())
    }
}
