//! Error types for autohunt.
//!
//! Uses `thiserror` for ergonomic error definitions. Each pipeline stage has
//! its own error enum so failures carry the context (tool, target, file,
//! table) the orchestrator logs without re-deriving it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid config format: {0}")]
    InvalidFormat(String),

    #[error("no tool named '{0}' is configured")]
    UnknownTool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by the scan worker pool and tool invocations.
///
/// Per-target failures (timeouts, non-zero exits) are recorded against the
/// target inside the scan report; they surface here only when a single
/// invocation is run directly.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot create output directory '{path}': {reason}")]
    OutputDir { path: PathBuf, reason: String },

    #[error("failed to launch '{tool}': {reason}")]
    Spawn { tool: String, reason: String },

    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("'{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("failed to parse tool report: {0}")]
    ReportParse(String),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised while cleaning a single raw artifact.
///
/// All variants are fatal for the file being cleaned, never for the
/// cleaning stage as a whole.
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("no registered tool matches file '{0}'")]
    UnresolvedTool(PathBuf),

    #[error("template '{template}' not found for tool '{tool}'")]
    TemplateNotFound { tool: String, template: String },

    #[error("template '{template}' has an invalid regex: {reason}")]
    InvalidRegex { template: String, reason: String },

    #[error("failed to read raw artifact {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write cleaned file {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Result type alias for cleaning operations.
pub type CleanResult<T> = Result<T, CleanError>;

/// Errors raised by the persistence adapter.
///
/// `Connect` is deliberately separate from the insert-time variants so
/// callers can distinguish "cannot reach the store" (abort the run) from
/// "this file failed" (skip the file).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot connect to database at '{url}': {reason}")]
    Connect { url: String, reason: String },

    #[error("cannot infer SQL dialect from URL '{0}'; set one explicitly")]
    UnknownDialect(String),

    #[error("cleaned file name '{0}' does not follow '<tool>_..._clean_<template>'")]
    BadFileName(PathBuf),

    #[error("no registered tool matches cleaned file '{0}'")]
    UnresolvedTool(PathBuf),

    #[error("template '{template}' not registered for tool '{tool}' (file {file})")]
    UnknownTemplate {
        tool: String,
        template: String,
        file: PathBuf,
    },

    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),

    #[error("line {line} of {file} has {found} column(s), table '{table}' expects {expected}")]
    ColumnMismatch {
        file: PathBuf,
        table: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("insert into '{table}' failed for {file}: {source}")]
    Insert {
        table: String,
        file: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("schema setup failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("failed to read cleaned file {path}: {reason}")]
    Read { path: PathBuf, reason: String },
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Hard failures that abort an orchestrated run.
///
/// Best-effort failures (one file of many, one target of many) never become
/// a `RunError`; they are counted in the step's log entry instead.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot read input directory '{path}': {reason}")]
    InputDir { path: PathBuf, reason: String },

    #[error("execution order is missing required data key '{0}'")]
    MissingData(String),

    #[error("cannot open run log '{path}': {reason}")]
    LogSetup { path: PathBuf, reason: String },
}

/// Result type alias for orchestrated runs.
pub type RunResult<T> = Result<T, RunError>;
