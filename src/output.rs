//! Output formatting utilities.
//!
//! Human-readable output with colors, plus JSON and CSV export of query
//! results. All terminal printing lives here; pipeline code only logs.

use console::style;
use serde::Serialize;
use std::io;

use crate::cli::OutputFormat;
use crate::orchestrator::{RunStatus, RunSummary, StepStatus};
use crate::scanner::ScanReport;

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print an informational message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("→").cyan(), msg);
}

/// Print and render an end-of-run summary.
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════").cyan()
    );
    println!(
        "            {} Run Summary",
        style("autohunt").cyan().bold()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════").cyan()
    );
    println!();
    println!("  {} {}", style("Run ID:").bold(), summary.run_id.short());
    println!("  {} {}", style("Platform:").bold(), summary.platform);
    if !summary.task.is_empty() {
        println!("  {} {}", style("Task:").bold(), summary.task);
    }

    let status = match summary.status {
        RunStatus::Completed => style("completed").green().bold(),
        RunStatus::Failed => style("failed").red().bold(),
    };
    println!("  {} {}", style("Status:").bold(), status);

    let duration = summary.finished_at - summary.started_at;
    println!(
        "  {} {:.2}s",
        style("Duration:").bold(),
        duration.num_milliseconds() as f64 / 1000.0
    );
    println!();

    for entry in &summary.entries {
        let marker = match entry.status {
            StepStatus::Success => style("✓").green(),
            StepStatus::Failed => style("✗").red(),
        };
        let mut line = format!("  {} {}", marker, entry.step);
        if let Some(items) = &entry.items {
            line.push_str(&format!(" ({} ok, {} failed)", items.succeeded, items.failed));
        }
        if let Some(error) = &entry.error {
            line.push_str(&format!(" — {}", style(error).red()));
        }
        println!("{line}");
    }
    println!();
}

/// Print a scan pool report in plain text.
pub fn print_scan_report(report: &ScanReport, quiet: bool) {
    if !quiet {
        for outcome in &report.outcomes {
            match &outcome.error {
                Some(error) => print_error(&format!("{}: {}", outcome.target, error)),
                None => {
                    if let Some(artifact) = &outcome.artifact {
                        print_success(&format!(
                            "{} -> {}",
                            outcome.target,
                            artifact.path.display()
                        ));
                    }
                    if let Some(host_report) = &outcome.report {
                        println!("{host_report}");
                    }
                }
            }
        }
    }

    println!(
        "{} targets: {} succeeded, {} failed [{:.2}s]",
        report.targets,
        style(report.succeeded).green(),
        style(report.failed).red(),
        report.duration_ms as f64 / 1000.0
    );
}

/// Print a scan pool report as one CSV row per target.
pub fn print_scan_csv(report: &ScanReport) -> io::Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["target", "status", "artifact", "error"])?;

    for outcome in &report.outcomes {
        let artifact = outcome
            .artifact
            .as_ref()
            .map(|a| a.path.display().to_string())
            .unwrap_or_default();
        writer.write_record([
            outcome.target.as_str(),
            if outcome.is_ok() { "ok" } else { "failed" },
            &artifact,
            outcome.error.as_deref().unwrap_or_default(),
        ])?;
    }

    writer.flush()
}

#[derive(Serialize)]
struct ScopeRow<'a> {
    platform: &'a str,
    scope: &'a str,
}

/// Print recorded scopes in the requested format.
pub fn print_scopes(platform: &str, scopes: &[String], format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => {
            if scopes.is_empty() {
                print_info(&format!("no scopes recorded for '{platform}'"));
            } else {
                println!("{}", style(format!("Scopes for {platform}:")).bold());
                for scope in scopes {
                    println!("  {scope}");
                }
            }
            Ok(())
        }
        OutputFormat::Json => {
            let rows: Vec<ScopeRow> = scopes
                .iter()
                .map(|s| ScopeRow {
                    platform,
                    scope: s,
                })
                .collect();
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            println!("{json}");
            Ok(())
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            writer.write_record(["platform", "scope"])?;
            for scope in scopes {
                writer.write_record([platform, scope])?;
            }
            writer.flush()
        }
    }
}
