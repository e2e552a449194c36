//! Tool identifiers and raw artifact naming.
//!
//! Every raw artifact is tagged with the `ToolId` that produced it at
//! creation time; downstream stages carry the tag instead of re-deriving it
//! from file names. Name-based recovery still exists (see
//! [`crate::registry::TemplateRegistry::resolve_tool`]) for artifacts picked
//! up from disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::Target;

/// Characters that never appear in an artifact file name.
const UNSAFE_FILENAME_CHARS: &[char] = &[':', '/', '\\', ' ', '*', '?', '"', '<', '>', '|'];

/// Identifier of an external scan tool (`nmap`, `ffuf`, ...).
///
/// Restricted to lowercase alphanumerics and underscores so the id can be
/// embedded in file names and SQL table identities without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolId(String);

impl ToolId {
    /// Validate and create a tool identifier.
    pub fn new(s: impl Into<String>) -> Result<Self, ToolIdError> {
        let s = s.into();
        if s.is_empty() {
            return Err(ToolIdError::Empty);
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ToolIdError::InvalidChars(s));
        }
        Ok(Self(s))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ToolId {
    type Err = ToolIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ToolId {
    type Error = ToolIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ToolId> for String {
    fn from(id: ToolId) -> Self {
        id.0
    }
}

/// Error type for tool identifier validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolIdError {
    #[error("tool identifier is empty")]
    Empty,
    #[error("tool identifier '{0}' may only contain [a-z0-9_]")]
    InvalidChars(String),
}

/// Output format an external tool is configured to emit on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Structured XML topology (parsed into a host report).
    Xml,
    /// Opaque text, passed through as-is.
    Text,
}

impl ArtifactFormat {
    /// File extension for raw artifacts of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Text => "txt",
        }
    }
}

/// Unprocessed tool output captured to disk for one target.
#[derive(Debug, Clone, Serialize)]
pub struct RawArtifact {
    /// The tool that produced the output.
    pub tool: ToolId,
    /// The target the tool was pointed at.
    pub target: Target,
    /// Where the raw bytes live.
    pub path: PathBuf,
    /// When the invocation finished.
    pub captured_at: DateTime<Utc>,
}

/// Replace filesystem-unsafe characters in a target string with `_`.
pub fn sanitize_target(s: &str) -> String {
    s.chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Build the artifact file name `<tool>_<sanitizedTarget>_<timestamp>.<ext>`.
pub fn artifact_file_name(
    tool: &ToolId,
    target: &Target,
    captured_at: DateTime<Utc>,
    extension: &str,
) -> String {
    format!(
        "{}_{}_{}.{}",
        tool,
        sanitize_target(target.as_str()),
        captured_at.format("%Y%m%d%H%M%S"),
        extension
    )
}
