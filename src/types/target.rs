//! Scan targets and target lists.
//!
//! A target is whatever the scope source produced: a hostname, a URL, or an
//! IP address. Targets are opaque strings here; interpretation is left to
//! the external tools they are handed to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// A single scan unit (host, URL, or IP).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Create a target from a raw scope line.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The target string as produced by the scope source.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A deduplicated, ordered list of targets.
///
/// Set semantics with first-occurrence order: the scanner dispatches each
/// target exactly once, in the order the scope source listed them.
#[derive(Debug, Clone, Default)]
pub struct TargetList {
    targets: Vec<Target>,
}

impl TargetList {
    /// Build a list from raw lines, trimming whitespace and dropping blank
    /// lines, `#` comments, and duplicates.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if seen.insert(line.to_string()) {
                targets.push(Target::new(line));
            }
        }

        Self { targets }
    }

    /// Load a target list from a scope file (one target per line).
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self::from_lines(content.lines()))
    }

    /// Number of unique targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over the targets in order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }
}

impl IntoIterator for TargetList {
    type Item = Target;
    type IntoIter = std::vec::IntoIter<Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}

impl FromIterator<Target> for TargetList {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        Self::from_lines(iter.into_iter().map(|t| t.0))
    }
}
