//! Template-driven cleaning engine.
//!
//! Turns raw tool output into canonical pipe-delimited rows: resolve the
//! owning tool, look up the named template, compile its regex, and emit one
//! record per matching line. Non-matching lines are silently discarded —
//! cleaning is a filter, not a validation pass.

use regex::Regex;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CleanError, CleanResult};
use crate::registry::{Template, TemplateRegistry};
use crate::types::{RawArtifact, ToolId};

/// Delimiter joining extracted field values in cleaned rows.
pub const FIELD_DELIMITER: &str = "|";

/// Suffix marker separating an artifact's base name from its template name.
pub const CLEAN_MARKER: &str = "_clean_";

/// A cleaned file produced from one raw artifact.
#[derive(Debug, Clone)]
pub struct CleanedFile {
    /// Where the cleaned rows were written.
    pub path: PathBuf,
    /// Tool that produced the raw artifact.
    pub tool: ToolId,
    /// Template applied.
    pub template: String,
    /// Number of rows emitted.
    pub records: usize,
}

/// The cleaning engine: a template registry plus an output directory.
pub struct Cleaner<'a> {
    registry: &'a TemplateRegistry,
    cleaned_dir: PathBuf,
}

impl<'a> Cleaner<'a> {
    /// Create a cleaner writing into `cleaned_dir` (created on demand).
    pub fn new(registry: &'a TemplateRegistry, cleaned_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            cleaned_dir: cleaned_dir.into(),
        }
    }

    /// Clean a tagged artifact; the artifact's tool id is authoritative and
    /// no name-based recovery happens.
    pub fn clean_artifact(
        &self,
        artifact: &RawArtifact,
        template_name: &str,
    ) -> CleanResult<CleanedFile> {
        self.clean_with_tool(&artifact.tool, &artifact.path, template_name)
    }

    /// Clean a raw file picked up from disk, recovering the owning tool
    /// from the file-name prefix (exact registered ids, longest match wins).
    pub fn clean_file(&self, input: &Path, template_name: &str) -> CleanResult<CleanedFile> {
        let base = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tool = self
            .registry
            .resolve_tool(&base)
            .ok_or_else(|| CleanError::UnresolvedTool(input.to_path_buf()))?
            .clone();

        self.clean_with_tool(&tool, input, template_name)
    }

    fn clean_with_tool(
        &self,
        tool: &ToolId,
        input: &Path,
        template_name: &str,
    ) -> CleanResult<CleanedFile> {
        let template = self.registry.template(tool, template_name).ok_or_else(|| {
            CleanError::TemplateNotFound {
                tool: tool.to_string(),
                template: template_name.to_string(),
            }
        })?;

        let re = Regex::new(&template.regex).map_err(|e| CleanError::InvalidRegex {
            template: template_name.to_string(),
            reason: e.to_string(),
        })?;

        let bytes = fs::read(input).map_err(|e| CleanError::Read {
            path: input.to_path_buf(),
            reason: e.to_string(),
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let records: Vec<String> = content
            .lines()
            .filter_map(|line| extract_record(&re, template, line))
            .collect();

        let out_path = self.output_path(input, template_name);
        fs::create_dir_all(&self.cleaned_dir).map_err(|e| CleanError::Write {
            path: self.cleaned_dir.clone(),
            reason: e.to_string(),
        })?;

        let file = fs::File::create(&out_path).map_err(|e| CleanError::Write {
            path: out_path.clone(),
            reason: e.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        for record in &records {
            writeln!(writer, "{record}").map_err(|e| CleanError::Write {
                path: out_path.clone(),
                reason: e.to_string(),
            })?;
        }
        writer.flush().map_err(|e| CleanError::Write {
            path: out_path.clone(),
            reason: e.to_string(),
        })?;

        debug!(
            tool = %tool,
            template = template_name,
            records = records.len(),
            out = %out_path.display(),
            "cleaned raw artifact"
        );

        Ok(CleanedFile {
            path: out_path,
            tool: tool.clone(),
            template: template_name.to_string(),
            records: records.len(),
        })
    }

    /// Output path `<basename>_clean_<templateName>.txt` in the cleaned dir.
    fn output_path(&self, input: &Path, template_name: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.cleaned_dir
            .join(format!("{stem}{CLEAN_MARKER}{template_name}.txt"))
    }
}

/// Extract one record from a line, or `None` when the line does not match
/// or the pattern captures nothing.
///
/// Emitted values are groups `1..=fields.len()`, capped by the number of
/// groups the pattern declares; groups that did not participate in the
/// match contribute empty strings.
fn extract_record(re: &Regex, template: &Template, line: &str) -> Option<String> {
    let caps = re.captures(line)?;
    if caps.len() <= 1 {
        return None;
    }

    let take = template.fields.len().min(caps.len() - 1);
    let values: Vec<&str> = (1..=take)
        .map(|i| caps.get(i).map_or("", |m| m.as_str()))
        .collect();

    Some(values.join(FIELD_DELIMITER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::from_json(
            r#"{
                "nmap": {
                    "open_ports": {
                        "regex": "^(\\w+) (\\d+)/(tcp|udp) (\\w+)$",
                        "fields": ["state", "port", "proto", "service"]
                    },
                    "states": {
                        "regex": "^(open)|(closed)",
                        "fields": ["open", "closed"]
                    },
                    "grepish": {
                        "regex": "open",
                        "fields": []
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn write_raw(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_port_state_extraction() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(
            &dir,
            "nmap_a.com_20260101000000.txt",
            "open 80/tcp http\nbanner noise\nclosed 22/tcp ssh\n",
        );

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        let cleaned = cleaner.clean_file(&raw, "open_ports").unwrap();

        assert_eq!(cleaned.records, 2);
        assert_eq!(cleaned.tool.as_str(), "nmap");
        assert_eq!(
            cleaned.path.file_name().unwrap().to_str().unwrap(),
            "nmap_a.com_20260101000000_clean_open_ports.txt"
        );

        let body = fs::read_to_string(&cleaned.path).unwrap();
        assert_eq!(body, "open|80|tcp|http\nclosed|22|tcp|ssh\n");
    }

    #[test]
    fn test_idempotent_and_order_preserving() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(
            &dir,
            "nmap_b.com_20260101000000.txt",
            "open 443/tcp https\nopen 80/tcp http\nopen 22/tcp ssh\n",
        );

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        let first = cleaner.clean_file(&raw, "open_ports").unwrap();
        let first_body = fs::read(&first.path).unwrap();

        let second = cleaner.clean_file(&raw, "open_ports").unwrap();
        let second_body = fs::read(&second.path).unwrap();

        assert_eq!(first_body, second_body);
        let text = String::from_utf8(first_body).unwrap();
        let rows: Vec<_> = text.lines().collect();
        assert_eq!(
            rows,
            ["open|443|tcp|https", "open|80|tcp|http", "open|22|tcp|ssh"]
        );
    }

    #[test]
    fn test_nonparticipating_group_is_empty() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(&dir, "nmap_c.com_20260101000000.txt", "open\nclosed\n");

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        let cleaned = cleaner.clean_file(&raw, "states").unwrap();

        let body = fs::read_to_string(&cleaned.path).unwrap();
        assert_eq!(body, "open|\n|closed\n");
    }

    #[test]
    fn test_groupless_pattern_emits_nothing() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(&dir, "nmap_d.com_20260101000000.txt", "open 80/tcp http\n");

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        let cleaned = cleaner.clean_file(&raw, "grepish").unwrap();
        assert_eq!(cleaned.records, 0);
    }

    #[test]
    fn test_unresolved_tool() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(&dir, "masscan_a.com_20260101000000.txt", "x\n");

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        assert!(matches!(
            cleaner.clean_file(&raw, "open_ports"),
            Err(CleanError::UnresolvedTool(_))
        ));
    }

    #[test]
    fn test_unknown_template() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(&dir, "nmap_a.com_20260101000000.txt", "x\n");

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        assert!(matches!(
            cleaner.clean_file(&raw, "nope"),
            Err(CleanError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_regex_is_per_file_error() {
        let registry = TemplateRegistry::from_json(
            r#"{ "nmap": { "broken": { "regex": "([unclosed", "fields": ["x"] } } }"#,
        )
        .unwrap();
        let dir = TempDir::new().unwrap();
        let raw = write_raw(&dir, "nmap_a.com_20260101000000.txt", "x\n");

        let cleaner = Cleaner::new(&registry, dir.path().join("cleaned"));
        assert!(matches!(
            cleaner.clean_file(&raw, "broken"),
            Err(CleanError::InvalidRegex { .. })
        ));
    }
}
