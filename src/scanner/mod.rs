//! Scan stage: a bounded worker pool over external tool invocations.
//!
//! W workers drain a shared queue pre-filled with the whole target list.
//! Each worker runs one subprocess at a time under a per-job deadline,
//! writes the raw artifact, and pushes an outcome into the result channel.
//! A failing target never affects its siblings; the pool itself only fails
//! when it cannot start.
//!
//! Completion is deterministic: workers are the only owners of the result
//! sender once dispatch ends, so the channel closes exactly when the last
//! worker exits and the aggregation loop cannot miss in-flight results.
//! No ordering is guaranteed between outcomes.

pub mod invoke;
pub mod xml_report;

pub use xml_report::{HostEntry, HostReport, PortEntry};

use chrono::Utc;
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{ConfigResult, ScanError, ScanResult};
use crate::types::{artifact_file_name, ArtifactFormat, RawArtifact, Target, TargetList, ToolId};

/// Substitution marker in argument templates.
pub const TARGET_MARKER: &str = "{target}";

/// One tool's scan configuration for a pool run.
#[derive(Debug, Clone)]
pub struct ScanJob {
    /// Tool identifier; also the binary name invoked.
    pub tool: ToolId,
    /// Argument template (see [`TARGET_MARKER`]).
    pub args: String,
    /// Expected stdout format.
    pub format: ArtifactFormat,
    /// Worker pool width.
    pub workers: usize,
    /// Per-invocation deadline.
    pub timeout: Duration,
    /// Directory raw artifacts are written into.
    pub output_dir: PathBuf,
}

impl ScanJob {
    /// Build a job for a configured tool.
    pub fn from_settings(settings: &Settings, tool: &ToolId) -> ConfigResult<Self> {
        let entry = settings.tool(tool)?;
        Ok(Self {
            tool: tool.clone(),
            args: entry.args.clone(),
            format: entry.format,
            workers: settings.scanner.workers,
            timeout: Duration::from_secs(settings.scanner.timeout_secs),
            output_dir: settings.paths.raw_dir.clone(),
        })
    }
}

/// Result of scanning a single target.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub target: Target,
    /// Written artifact, when the invocation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<RawArtifact>,
    /// Parsed host report for XML-format tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<HostReport>,
    /// Error recorded against this target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanOutcome {
    /// Whether this target produced an artifact.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(target: &Target, error: String) -> Self {
        Self {
            target: target.clone(),
            artifact: None,
            report: None,
            error: Some(error),
        }
    }
}

/// Complete pool run results for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub tool: ToolId,
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<ScanOutcome>,
}

/// Execute a scan job over a deduplicated target list.
pub async fn run_pool(
    job: &ScanJob,
    targets: TargetList,
    progress: Option<ProgressBar>,
) -> ScanResult<ScanReport> {
    let start = Instant::now();

    fs::create_dir_all(&job.output_dir).map_err(|e| ScanError::OutputDir {
        path: job.output_dir.clone(),
        reason: e.to_string(),
    })?;

    let total = targets.len();
    let queue: Arc<Mutex<VecDeque<Target>>> = Arc::new(Mutex::new(targets.into_iter().collect()));
    let (tx, mut rx) = mpsc::channel::<ScanOutcome>(total.max(1));

    let mut workers = JoinSet::new();
    for worker in 0..job.workers.max(1) {
        let queue = Arc::clone(&queue);
        let tx = tx.clone();
        let job = job.clone();

        workers.spawn(async move {
            loop {
                let next = queue.lock().expect("job queue poisoned").pop_front();
                let Some(target) = next else { break };

                debug!(worker, target = %target, tool = %job.tool, "dispatching scan job");
                let outcome = scan_one(&job, &target).await;
                if tx.send(outcome).await.is_err() {
                    break;
                }
            }
        });
    }

    // Workers now hold the only senders; the channel closes once every
    // worker has exited, which is what ends the loop below.
    drop(tx);

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = rx.recv().await {
        if let Some(pb) = &progress {
            pb.inc(1);
        }
        if let Some(error) = &outcome.error {
            warn!(tool = %job.tool, target = %outcome.target, %error, "scan target failed");
        }
        outcomes.push(outcome);
    }

    while workers.join_next().await.is_some() {}

    if let Some(pb) = progress {
        pb.finish_with_message("scan complete");
    }

    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
    Ok(ScanReport {
        tool: job.tool.clone(),
        targets: total,
        succeeded,
        failed: outcomes.len() - succeeded,
        duration_ms: start.elapsed().as_millis() as u64,
        outcomes,
    })
}

/// Scan one target: invoke the tool, persist raw output, parse the report.
async fn scan_one(job: &ScanJob, target: &Target) -> ScanOutcome {
    let argv = build_argv(&job.args, target);
    let captured_at = Utc::now();
    let name = artifact_file_name(&job.tool, target, captured_at, job.format.extension());
    let path = job.output_dir.join(name);

    let stdout = match invoke::run_tool(job.tool.as_str(), &argv, job.timeout).await {
        Ok(bytes) => bytes,
        Err(e) => return ScanOutcome::failed(target, e.to_string()),
    };

    if let Err(e) = tokio::fs::write(&path, &stdout).await {
        return ScanOutcome::failed(
            target,
            format!("failed to persist raw output to {}: {e}", path.display()),
        );
    }

    let report = match job.format {
        ArtifactFormat::Xml => {
            match xml_report::parse(&String::from_utf8_lossy(&stdout), target.as_str()) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(target = %target, error = %e, "report parse failed, raw artifact kept");
                    None
                }
            }
        }
        ArtifactFormat::Text => None,
    };

    ScanOutcome {
        target: target.clone(),
        artifact: Some(RawArtifact {
            tool: job.tool.clone(),
            target: target.clone(),
            path,
            captured_at,
        }),
        report,
        error: None,
    }
}

/// Expand an argument template for one target.
///
/// Every `{target}` marker is replaced; without a marker the target is
/// appended as the final argument.
fn build_argv(template: &str, target: &Target) -> Vec<String> {
    let mut argv = Vec::new();
    let mut substituted = false;

    for token in template.split_whitespace() {
        if token.contains(TARGET_MARKER) {
            substituted = true;
            argv.push(token.replace(TARGET_MARKER, target.as_str()));
        } else {
            argv.push(token.to_string());
        }
    }

    if !substituted {
        argv.push(target.as_str().to_string());
    }

    argv
}
