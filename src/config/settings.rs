//! Application settings.
//!
//! Settings default to XDG-compliant locations via `directories` and load
//! from a JSON file; every section tolerates partial documents.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::store::SqlDialect;
use crate::types::{ArtifactFormat, ToolId};

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "autohunt", "autohunt")
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("autohunt-data"))
}

fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("autohunt-config"))
}

/// Filesystem locations used by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory for raw tool output.
    pub raw_dir: PathBuf,
    /// Directory for cleaned, pipe-delimited files.
    pub cleaned_dir: PathBuf,
    /// Directory for run logs and summaries.
    pub log_dir: PathBuf,
    /// Scope file: one target per line.
    pub targets_file: PathBuf,
    /// Cleaning template registry document.
    pub registry_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let data = data_dir();
        Self {
            raw_dir: data.join("raw"),
            cleaned_dir: data.join("cleaned"),
            log_dir: data.join("logs"),
            targets_file: data.join("targets.txt"),
            registry_file: config_dir().join("templates.json"),
        }
    }
}

/// Persistence connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL (`postgres://...` or `sqlite://...`).
    pub url: String,
    /// SQL dialect; inferred from the URL scheme when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialect: Option<SqlDialect>,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: format!("sqlite://{}/autohunt.db?mode=rwc", data_dir().display()),
            dialect: None,
            max_connections: 5,
        }
    }
}

/// Worker pool parameters for the scan stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// Number of pool workers.
    pub workers: usize,
    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            timeout_secs: 60,
        }
    }
}

/// One configured external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Argument template; every `{target}` marker is replaced with the
    /// target, or the target is appended when no marker is present.
    pub args: String,
    /// Expected stdout format.
    pub format: ArtifactFormat,
    /// Default cleaning template for this tool's artifacts.
    pub template: String,
}

/// Application-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filesystem locations.
    pub paths: PathSettings,
    /// Persistence connection.
    pub database: DatabaseSettings,
    /// Scan pool sizing and deadlines.
    pub scanner: ScannerSettings,
    /// Configured external tools, keyed by tool identifier.
    pub tools: BTreeMap<ToolId, ToolEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut tools = BTreeMap::new();
        if let Ok(nmap) = ToolId::new("nmap") {
            tools.insert(
                nmap,
                ToolEntry {
                    args: "-sV -Pn -oX - {target}".to_string(),
                    format: ArtifactFormat::Xml,
                    template: "open_ports".to_string(),
                },
            );
        }

        Self {
            paths: PathSettings::default(),
            database: DatabaseSettings::default(),
            scanner: ScannerSettings::default(),
            tools,
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    /// when no file exists yet.
    pub fn load() -> ConfigResult<Self> {
        let file = config_dir().join("settings.json");
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Look up a configured tool entry.
    pub fn tool(&self, id: &ToolId) -> ConfigResult<&ToolEntry> {
        self.tools
            .get(id)
            .ok_or_else(|| ConfigError::UnknownTool(id.to_string()))
    }

    /// Create the runtime directories (raw, cleaned, logs).
    pub fn ensure_runtime_dirs(&self) -> ConfigResult<()> {
        fs::create_dir_all(&self.paths.raw_dir)?;
        fs::create_dir_all(&self.paths.cleaned_dir)?;
        fs::create_dir_all(&self.paths.log_dir)?;
        Ok(())
    }
}
