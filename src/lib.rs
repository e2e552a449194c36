//! # autohunt - Automated Reconnaissance Pipeline
//!
//! autohunt turns a list of targets into scan results stored in a queryable
//! database, through four chained stages: collect targets, run external
//! scan tools concurrently, normalize raw tool output via regex templates,
//! and persist cleaned rows.
//!
//! ## Features
//!
//! - **Bounded Worker Pool**: one subprocess per target under a per-job
//!   deadline, with per-target failure isolation
//! - **Template-Driven Cleaning**: regex templates from an external
//!   registry turn raw output into canonical pipe-delimited rows
//! - **Dialect-Agnostic Store**: parameterized inserts against PostgreSQL
//!   or SQLite, one atomic transaction per cleaned file
//! - **Step Orchestration**: ordered plans with hard-failure aborts,
//!   best-effort per-item isolation, and structured run summaries
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use autohunt::config::Settings;
//! use autohunt::orchestrator::{Orchestrator, Plan};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::load().unwrap();
//!     let plan = Plan::standard("hackerone");
//!
//!     let summary = Orchestrator::new(&settings).run(&plan).await.unwrap();
//!     println!("run {} finished: {:?}", summary.run_id, summary.status);
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`types`] - Core type definitions with newtype patterns for type safety
//! - [`scanner`] - Scan worker pool and external tool invocation
//! - [`cleaner`] - Template-driven cleaning engine
//! - [`store`] - Dynamic persistence adapter
//! - [`orchestrator`] - Plan execution and run summaries
//! - [`registry`] - Cleaning template registry
//! - [`config`] - Configuration management
//! - [`error`] - Comprehensive error types
//! - [`output`] - Output formatting utilities

pub mod cleaner;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod registry;
pub mod scanner;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{CleanError, ConfigError, RunError, ScanError, StoreError};
pub use orchestrator::{Orchestrator, Plan, RunSummary, StepKind};
pub use registry::TemplateRegistry;
pub use store::{SqlDialect, Store};
pub use types::{RawArtifact, RunId, Target, TargetList, ToolId};
