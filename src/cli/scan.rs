//! Scan subcommand implementation.
//!
//! Runs one configured tool's worker pool over the target list, standalone.

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::OutputFormat;
use crate::config::Settings;
use crate::output;
use crate::scanner::{self, ScanJob};
use crate::types::{TargetList, ToolId};

/// Run one tool's scan pool over the target list.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Configured tool to run (e.g. nmap)
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Target list file (defaults to the configured scope file)
    #[arg(short = 'T', long, value_name = "PATH")]
    pub targets: Option<PathBuf>,

    /// Override the configured argument template
    #[arg(long, value_name = "ARGS")]
    pub args: Option<String>,

    /// Number of pool workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Per-invocation timeout in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Directory for raw artifacts
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(
        &self,
        settings: &Settings,
        verbose: bool,
        quiet: bool,
    ) -> anyhow::Result<()> {
        let tool: ToolId = self.tool.parse()?;
        let mut job = ScanJob::from_settings(settings, &tool)?;

        if let Some(args) = &self.args {
            job.args = args.clone();
        }
        if let Some(workers) = self.workers {
            job.workers = workers;
        }
        if let Some(timeout) = self.timeout {
            job.timeout = Duration::from_secs(timeout);
        }
        if let Some(dir) = &self.output_dir {
            job.output_dir = dir.clone();
        }

        let targets_file = self
            .targets
            .as_deref()
            .unwrap_or(&settings.paths.targets_file);
        let targets = TargetList::from_file(targets_file)
            .with_context(|| format!("cannot load targets from {}", targets_file.display()))?;

        if targets.is_empty() {
            bail!("target list {} is empty", targets_file.display());
        }

        let progress = if verbose && !quiet {
            let pb = ProgressBar::new(targets.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let report = scanner::run_pool(&job, targets, progress).await?;

        match self.output {
            OutputFormat::Plain => output::print_scan_report(&report, quiet),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Csv => output::print_scan_csv(&report)?,
        }

        if report.succeeded == 0 && report.failed > 0 {
            bail!("every target failed");
        }
        Ok(())
    }
}
