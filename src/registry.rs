//! Cleaning template registry.
//!
//! The registry is an external JSON document mapping tool identifiers to
//! named templates, each a regex pattern plus the ordered list of fields
//! its capture groups populate:
//!
//! ```json
//! {
//!   "nmap": {
//!     "open_ports": {
//!       "regex": "^(\\w+) (\\d+)/(tcp|udp) (\\w+)$",
//!       "fields": ["state", "port", "proto", "service"]
//!     }
//!   }
//! }
//! ```
//!
//! Both the Cleaner (group extraction) and the Store (table identity and
//! ordered column lists) resolve against the same registry, so the two
//! stages can never disagree about a template's shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::ToolId;

/// A named extraction template: a regex plus the ordered fields its
/// capture groups map to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Pattern applied line-by-line to raw artifacts.
    pub regex: String,
    /// Ordered field names; group `i+1` populates `fields[i]`.
    pub fields: Vec<String>,
}

/// Error type for registry loading.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read template registry {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("malformed template registry: {0}")]
    Format(String),

    #[error("template name '{name}' under tool '{tool}' may only contain [a-z0-9_]")]
    InvalidTemplateName { tool: String, name: String },
}

/// All registered templates, keyed by tool identifier and template name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRegistry {
    tools: BTreeMap<ToolId, BTreeMap<String, Template>>,
}

impl TemplateRegistry {
    /// Load and validate a registry document from disk.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|e| RegistryError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a registry document.
    pub fn from_json(content: &str) -> Result<Self, RegistryError> {
        let registry: Self =
            serde_json::from_str(content).map_err(|e| RegistryError::Format(e.to_string()))?;

        for (tool, templates) in &registry.tools {
            for name in templates.keys() {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
                if !valid {
                    return Err(RegistryError::InvalidTemplateName {
                        tool: tool.to_string(),
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(registry)
    }

    /// Look up a template by tool and name.
    pub fn template(&self, tool: &ToolId, name: &str) -> Option<&Template> {
        self.tools.get(tool)?.get(name)
    }

    /// Whether any templates are registered for a tool.
    pub fn has_tool(&self, tool: &ToolId) -> bool {
        self.tools.contains_key(tool)
    }

    /// Recover the owning tool from an artifact file name.
    ///
    /// Only exact registered identifiers match, as `<id>_` prefixes of the
    /// base name; when several match the longest wins. Returns `None` when
    /// no registered tool owns the file.
    pub fn resolve_tool(&self, file_name: &str) -> Option<&ToolId> {
        self.tools
            .keys()
            .filter(|id| {
                file_name.len() > id.as_str().len()
                    && file_name.starts_with(id.as_str())
                    && file_name.as_bytes()[id.as_str().len()] == b'_'
            })
            .max_by_key(|id| id.as_str().len())
    }

    /// Iterate over every (tool, template name, template) triple.
    pub fn iter(&self) -> impl Iterator<Item = (&ToolId, &str, &Template)> {
        self.tools.iter().flat_map(|(tool, templates)| {
            templates
                .iter()
                .map(move |(name, template)| (tool, name.as_str(), template))
        })
    }
}
