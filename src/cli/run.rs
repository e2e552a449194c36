//! Run subcommand implementation.
//!
//! Executes an orchestrated pipeline run from an order document or the
//! standard collect → scan → clean → store plan.

use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;

use crate::config::Settings;
use crate::orchestrator::{Orchestrator, Plan, RunStatus};
use crate::output;

/// Execute an orchestrated pipeline run.
#[derive(Parser, Debug)]
pub struct RunCommand {
    /// Path to an execution order document (JSON)
    #[arg(long, value_name = "PATH", conflicts_with = "platform")]
    pub order: Option<PathBuf>,

    /// Run the standard plan for this platform
    #[arg(short, long)]
    pub platform: Option<String>,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(&self, settings: &Settings, quiet: bool) -> anyhow::Result<()> {
        let plan = match (&self.order, &self.platform) {
            (Some(path), _) => Plan::from_file(path)?,
            (None, Some(platform)) => Plan::standard(platform.clone()),
            (None, None) => bail!("pass --order <PATH> or --platform <NAME>"),
        };

        let orchestrator = Orchestrator::new(settings);
        let summary = orchestrator.run(&plan).await?;

        if !quiet {
            output::print_run_summary(&summary);
        }

        if summary.status == RunStatus::Failed {
            bail!("run {} failed; see the summary above", summary.run_id.short());
        }
        Ok(())
    }
}
