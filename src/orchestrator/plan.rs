//! Execution plans.
//!
//! A plan is an ordered list of named steps tied to a platform/task pair,
//! loaded from a JSON order document or built from the standard pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The operations a plan step can name.
///
/// Unknown step names fail plan deserialization; there is no catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Load and deduplicate the scope file.
    CollectTargets,
    /// Run every configured tool's worker pool over the targets.
    RunScanners,
    /// Apply cleaning templates to raw artifacts.
    CleanResults,
    /// Ingest cleaned files into the store.
    StoreResults,
    /// Ad hoc: record a scope string for the platform.
    InsertScope,
    /// Ad hoc: list the scopes recorded for the platform.
    ListScopes,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectTargets => "CollectTargets",
            Self::RunScanners => "RunScanners",
            Self::CleanResults => "CleanResults",
            Self::StoreResults => "StoreResults",
            Self::InsertScope => "InsertScope",
            Self::ListScopes => "ListScopes",
        };
        write!(f, "{name}")
    }
}

/// One step of an execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// The operation to run.
    pub step: StepKind,
    /// Human-readable description for logs.
    #[serde(default)]
    pub description: String,
}

impl PlanStep {
    fn new(step: StepKind, description: &str) -> Self {
        Self {
            step,
            description: description.to_string(),
        }
    }
}

/// Error type for plan loading.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read execution order {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("malformed execution order: {0}")]
    Format(String),

    #[error("execution order has no steps")]
    Empty,
}

/// An ordered list of steps bound to a platform and task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Bug-bounty platform this run is scoped to.
    pub platform: String,
    /// Task label for logs and summaries.
    #[serde(default)]
    pub task: String,
    /// Steps, executed strictly in order.
    pub steps: Vec<PlanStep>,
    /// Extra key/value data some steps consume (e.g. `scope`).
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl Plan {
    /// Load an order document from disk.
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        let content = fs::read_to_string(path).map_err(|e| PlanError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let plan: Self =
            serde_json::from_str(&content).map_err(|e| PlanError::Format(e.to_string()))?;
        if plan.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        Ok(plan)
    }

    /// The standard pipeline: collect → scan → clean → store.
    pub fn standard(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            task: "full_hunt".to_string(),
            steps: vec![
                PlanStep::new(StepKind::CollectTargets, "Load and deduplicate the scope file"),
                PlanStep::new(StepKind::RunScanners, "Run configured tools over all targets"),
                PlanStep::new(StepKind::CleanResults, "Normalize raw artifacts via templates"),
                PlanStep::new(StepKind::StoreResults, "Persist cleaned rows"),
            ],
            data: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_standard_plan_order() {
        let plan = Plan::standard("hackerone");
        let kinds: Vec<_> = plan.steps.iter().map(|s| s.step).collect();
        assert_eq!(
            kinds,
            [
                StepKind::CollectTargets,
                StepKind::RunScanners,
                StepKind::CleanResults,
                StepKind::StoreResults,
            ]
        );
    }

    #[test]
    fn test_order_document_roundtrip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{
                "platform": "bugcrowd",
                "task": "store_only",
                "steps": [
                    {{"step": "CleanResults", "description": "clean"}},
                    {{"step": "StoreResults"}}
                ],
                "data": {{"scope": "*.acme.com"}}
            }}"#
        )
        .unwrap();

        let plan = Plan::from_file(f.path()).unwrap();
        assert_eq!(plan.platform, "bugcrowd");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].step, StepKind::StoreResults);
        assert_eq!(plan.data["scope"], "*.acme.com");
    }

    #[test]
    fn test_unknown_step_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"platform": "x", "steps": [{{"step": "LaunchMissiles"}}]}}"#
        )
        .unwrap();

        assert!(matches!(
            Plan::from_file(f.path()),
            Err(PlanError::Format(_))
        ));
    }

    #[test]
    fn test_empty_plan_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"platform": "x", "steps": []}}"#).unwrap();

        assert!(matches!(Plan::from_file(f.path()), Err(PlanError::Empty)));
    }
}
