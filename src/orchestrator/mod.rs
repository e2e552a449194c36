//! Step-sequencing orchestrator.
//!
//! Executes a plan's steps strictly in order. A hard failure (unreadable
//! input directory, unreachable store, malformed registry) aborts the run
//! and skips every remaining step; per-item failures inside a best-effort
//! step (one file of many, one target of many) are logged, counted, and
//! never abort. Every transition appends to the append-only run log, and a
//! structured summary is persisted when the run ends — success or not.

mod plan;

pub use plan::{Plan, PlanError, PlanStep, StepKind};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::cleaner::{Cleaner, CLEAN_MARKER};
use crate::config::Settings;
use crate::error::{RunError, RunResult};
use crate::registry::TemplateRegistry;
use crate::scanner::{self, ScanJob};
use crate::store::Store;
use crate::types::{RawArtifact, RunId, TargetList};

/// Outcome of one executed step: per-item counts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Status recorded for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// One transition in the run log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub step: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<StepOutcome>,
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Structured end-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub platform: String,
    pub task: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<LogEntry>,
}

impl RunSummary {
    /// Find the log entry for a named step.
    pub fn entry(&self, step: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.step == step)
    }
}

/// Mutable state threaded through a run's steps.
///
/// Artifacts carry their tool tag from the scanner, so downstream steps
/// operate on tagged values instead of re-deriving tools from file names;
/// directory scanning is the fallback for plans that skip earlier stages.
struct RunContext<'a> {
    settings: &'a Settings,
    registry: &'a TemplateRegistry,
    platform: String,
    data: HashMap<String, String>,
    targets: Option<TargetList>,
    artifacts: Vec<RawArtifact>,
    cleaned: Vec<PathBuf>,
}

#[async_trait]
trait StepHandler: Send + Sync {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome>;
}

fn handler_for(kind: StepKind) -> Box<dyn StepHandler> {
    match kind {
        StepKind::CollectTargets => Box::new(CollectTargetsStep),
        StepKind::RunScanners => Box::new(RunScannersStep),
        StepKind::CleanResults => Box::new(CleanResultsStep),
        StepKind::StoreResults => Box::new(StoreResultsStep),
        StepKind::InsertScope => Box::new(InsertScopeStep),
        StepKind::ListScopes => Box::new(ListScopesStep),
    }
}

struct CollectTargetsStep;

#[async_trait]
impl StepHandler for CollectTargetsStep {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome> {
        let list = TargetList::from_file(&cx.settings.paths.targets_file)?;
        info!(targets = list.len(), "scope collected and deduplicated");

        let count = list.len();
        cx.targets = Some(list);
        Ok(StepOutcome {
            succeeded: count,
            failed: 0,
        })
    }
}

struct RunScannersStep;

#[async_trait]
impl StepHandler for RunScannersStep {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome> {
        let targets = match &cx.targets {
            Some(list) => list.clone(),
            None => TargetList::from_file(&cx.settings.paths.targets_file)?,
        };

        let mut succeeded = 0;
        let mut failed = 0;

        for tool in cx.settings.tools.keys() {
            let job = ScanJob::from_settings(cx.settings, tool)?;
            let report = scanner::run_pool(&job, targets.clone(), None).await?;
            info!(
                tool = %tool,
                succeeded = report.succeeded,
                failed = report.failed,
                "scan pool finished"
            );

            succeeded += report.succeeded;
            failed += report.failed;
            cx.artifacts
                .extend(report.outcomes.into_iter().filter_map(|o| o.artifact));
        }

        Ok(StepOutcome { succeeded, failed })
    }
}

struct CleanResultsStep;

#[async_trait]
impl StepHandler for CleanResultsStep {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome> {
        let cleaner = Cleaner::new(cx.registry, cx.settings.paths.cleaned_dir.clone());
        let mut succeeded = 0;
        let mut failed = 0;

        if !cx.artifacts.is_empty() {
            for artifact in &cx.artifacts {
                let template = match cx.settings.tool(&artifact.tool) {
                    Ok(entry) => entry.template.clone(),
                    Err(e) => {
                        warn!(file = %artifact.path.display(), error = %e, "skipping artifact");
                        failed += 1;
                        continue;
                    }
                };
                match cleaner.clean_artifact(artifact, &template) {
                    Ok(cleaned) => {
                        cx.cleaned.push(cleaned.path);
                        succeeded += 1;
                    }
                    Err(e) => {
                        warn!(file = %artifact.path.display(), error = %e, "failed to clean file");
                        failed += 1;
                    }
                }
            }
            return Ok(StepOutcome { succeeded, failed });
        }

        // No in-run artifacts: sweep the raw directory. Files that no
        // registered tool owns are not artifacts and are skipped silently.
        let raw_dir = &cx.settings.paths.raw_dir;
        let entries = fs::read_dir(raw_dir).map_err(|e| RunError::InputDir {
            path: raw_dir.clone(),
            reason: e.to_string(),
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(tool) = cx.registry.resolve_tool(&name) else {
                continue;
            };

            let template = match cx.settings.tool(tool) {
                Ok(entry) => entry.template.clone(),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping file");
                    failed += 1;
                    continue;
                }
            };

            match cleaner.clean_file(&path, &template) {
                Ok(cleaned) => {
                    cx.cleaned.push(cleaned.path);
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to clean file");
                    failed += 1;
                }
            }
        }

        Ok(StepOutcome { succeeded, failed })
    }
}

struct StoreResultsStep;

#[async_trait]
impl StepHandler for StoreResultsStep {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome> {
        let store = Store::connect(&cx.settings.database).await?;
        store.init_schema(cx.registry).await?;

        let files: Vec<PathBuf> = if !cx.cleaned.is_empty() {
            cx.cleaned.clone()
        } else {
            let cleaned_dir = &cx.settings.paths.cleaned_dir;
            let entries = fs::read_dir(cleaned_dir).map_err(|e| RunError::InputDir {
                path: cleaned_dir.clone(),
                reason: e.to_string(),
            })?;

            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| {
                    p.is_file()
                        && p.file_name()
                            .map(|n| n.to_string_lossy().contains(CLEAN_MARKER))
                            .unwrap_or(false)
                })
                .collect()
        };

        let mut succeeded = 0;
        let mut failed = 0;
        for file in &files {
            match store.ingest_file(file, cx.registry).await {
                Ok(report) => {
                    info!(table = %report.table, rows = report.rows, "cleaned file stored");
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "failed to store cleaned file");
                    failed += 1;
                }
            }
        }

        Ok(StepOutcome { succeeded, failed })
    }
}

struct InsertScopeStep;

#[async_trait]
impl StepHandler for InsertScopeStep {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome> {
        let scope = cx
            .data
            .get("scope")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RunError::MissingData("scope".to_string()))?
            .clone();

        let store = Store::connect(&cx.settings.database).await?;
        store.init_schema(cx.registry).await?;
        store.insert_scope(&cx.platform, &scope).await?;

        info!(platform = %cx.platform, scope = %scope, "scope recorded");
        Ok(StepOutcome {
            succeeded: 1,
            failed: 0,
        })
    }
}

struct ListScopesStep;

#[async_trait]
impl StepHandler for ListScopesStep {
    async fn run(&self, cx: &mut RunContext<'_>) -> RunResult<StepOutcome> {
        let store = Store::connect(&cx.settings.database).await?;
        store.init_schema(cx.registry).await?;

        let scopes = store.list_scopes(&cx.platform).await?;
        for scope in &scopes {
            info!(platform = %cx.platform, scope = %scope, "registered scope");
        }

        Ok(StepOutcome {
            succeeded: scopes.len(),
            failed: 0,
        })
    }
}

/// Append-only run log: in-memory entries plus a human-readable stream.
struct RunLog {
    entries: Vec<LogEntry>,
    file: fs::File,
}

impl RunLog {
    fn open(log_dir: &Path, run_id: RunId) -> RunResult<Self> {
        fs::create_dir_all(log_dir).map_err(|e| RunError::LogSetup {
            path: log_dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let path = log_dir.join("run.log");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RunError::LogSetup {
                path,
                reason: e.to_string(),
            })?;

        let _ = writeln!(file, "=== run {} started {} ===", run_id.short(), Utc::now());
        Ok(Self {
            entries: Vec::new(),
            file,
        })
    }

    fn record(&mut self, entry: LogEntry) {
        let _ = writeln!(self.file, "{}", render_entry(&entry));
        self.entries.push(entry);
    }

    fn success(&mut self, step: impl Into<String>, items: Option<StepOutcome>) {
        self.record(LogEntry {
            timestamp: Utc::now(),
            step: step.into(),
            status: StepStatus::Success,
            error: None,
            items,
        });
    }

    fn failure(&mut self, step: impl Into<String>, error: &dyn std::fmt::Display) {
        self.record(LogEntry {
            timestamp: Utc::now(),
            step: step.into(),
            status: StepStatus::Failed,
            error: Some(error.to_string()),
            items: None,
        });
    }
}

fn render_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{}  {}  {}",
        entry.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        entry.step,
        match entry.status {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        }
    );
    if let Some(items) = &entry.items {
        line.push_str(&format!("  items={}/{}", items.succeeded, items.failed));
    }
    if let Some(error) = &entry.error {
        line.push_str(&format!("  error={error}"));
    }
    line
}

/// The step sequencer.
pub struct Orchestrator<'a> {
    settings: &'a Settings,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over a settings value.
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Execute a plan.
    ///
    /// Returns `Err` only when the run log cannot be opened; every other
    /// failure is recorded in the returned summary, which is also persisted
    /// to `summary_<run-id>.json` in the log directory.
    pub async fn run(&self, plan: &Plan) -> RunResult<RunSummary> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let mut log = RunLog::open(&self.settings.paths.log_dir, run_id)?;

        info!(run = %run_id.short(), platform = %plan.platform, task = %plan.task, "run started");

        let mut status = RunStatus::Completed;

        // Registry failures at startup abort the whole run.
        let registry = match TemplateRegistry::from_file(&self.settings.paths.registry_file) {
            Ok(registry) => {
                log.success("LoadRegistry", None);
                registry
            }
            Err(e) => {
                error!(error = %e, "cannot load template registry");
                log.failure("LoadRegistry", &e);
                return Ok(self.finalize(run_id, plan, RunStatus::Failed, started_at, log));
            }
        };

        let mut cx = RunContext {
            settings: self.settings,
            registry: &registry,
            platform: plan.platform.clone(),
            data: plan.data.clone(),
            targets: None,
            artifacts: Vec::new(),
            cleaned: Vec::new(),
        };

        for step in &plan.steps {
            info!(step = %step.step, description = %step.description, "starting step");

            match handler_for(step.step).run(&mut cx).await {
                Ok(outcome) => {
                    info!(
                        step = %step.step,
                        succeeded = outcome.succeeded,
                        failed = outcome.failed,
                        "step completed"
                    );
                    log.success(step.step.to_string(), Some(outcome));
                }
                Err(e) => {
                    error!(step = %step.step, error = %e, "step failed, aborting run");
                    log.failure(step.step.to_string(), &e);
                    status = RunStatus::Failed;
                    break;
                }
            }
        }

        Ok(self.finalize(run_id, plan, status, started_at, log))
    }

    fn finalize(
        &self,
        run_id: RunId,
        plan: &Plan,
        status: RunStatus,
        started_at: DateTime<Utc>,
        mut log: RunLog,
    ) -> RunSummary {
        match status {
            RunStatus::Completed => log.success("ExecutionCompleted", None),
            RunStatus::Failed => log.record(LogEntry {
                timestamp: Utc::now(),
                step: "ExecutionCompleted".to_string(),
                status: StepStatus::Failed,
                error: None,
                items: None,
            }),
        }

        let summary = RunSummary {
            run_id,
            platform: plan.platform.clone(),
            task: plan.task.clone(),
            status,
            started_at,
            finished_at: Utc::now(),
            entries: log.entries,
        };

        let path = self
            .settings
            .paths
            .log_dir
            .join(format!("summary_{run_id}.json"));
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    warn!(path = %path.display(), error = %e, "could not persist run summary");
                }
            }
            Err(e) => warn!(error = %e, "could not serialize run summary"),
        }

        info!(run = %run_id.short(), status = ?status, "run finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_entry_with_items() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            step: "CleanResults".to_string(),
            status: StepStatus::Success,
            error: None,
            items: Some(StepOutcome {
                succeeded: 2,
                failed: 1,
            }),
        };
        let line = render_entry(&entry);
        assert!(line.contains("CleanResults"));
        assert!(line.contains("success"));
        assert!(line.contains("items=2/1"));
    }

    #[test]
    fn test_render_entry_with_error() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            step: "StoreResults".to_string(),
            status: StepStatus::Failed,
            error: Some("cannot connect".to_string()),
            items: None,
        };
        let line = render_entry(&entry);
        assert!(line.contains("failed"));
        assert!(line.contains("error=cannot connect"));
    }
}
