//! Dynamic persistence adapter.
//!
//! Cleaned files land in tables whose identity is `<tool>_<templateName>`,
//! with one TEXT column per template field, bound positionally. Each file
//! is ingested in a single transaction: either every row commits or none
//! do. Column order in cleaned files matches the destination table because
//! both sides are derived from the same registry template — `init_schema`
//! makes that contract concrete instead of assumed.

mod dialect;

pub use dialect::SqlDialect;

use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};

use crate::cleaner::{CLEAN_MARKER, FIELD_DELIMITER};
use crate::config::DatabaseSettings;
use crate::error::{StoreError, StoreResult};
use crate::registry::{Template, TemplateRegistry};
use crate::types::ToolId;

static DRIVERS: Once = Once::new();

/// Register the compiled-in sqlx `Any` drivers. Safe to call repeatedly.
pub fn install_drivers() {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Outcome of ingesting one cleaned file.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Destination table.
    pub table: String,
    /// Rows committed.
    pub rows: usize,
    /// Source file.
    pub file: PathBuf,
}

/// A connected persistence adapter.
pub struct Store {
    pool: AnyPool,
    dialect: SqlDialect,
}

impl Store {
    /// Connect and verify connectivity.
    ///
    /// Fails fast with [`StoreError::Connect`] when the database is
    /// unreachable, before any stage work has started.
    pub async fn connect(settings: &DatabaseSettings) -> StoreResult<Self> {
        install_drivers();

        let dialect = match settings.dialect {
            Some(d) => d,
            None => SqlDialect::from_url(&settings.url)?,
        };

        let connect_err = |e: sqlx::Error| StoreError::Connect {
            url: settings.url.clone(),
            reason: e.to_string(),
        };

        let pool = AnyPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect(&settings.url)
            .await
            .map_err(connect_err)?;

        // Ping so a wrong host/credential surfaces here, not mid-ingest.
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(connect_err)?;

        info!(dialect = %dialect, "database connection established");
        Ok(Self { pool, dialect })
    }

    /// The active dialect.
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Create the `scopes` table and one table per registered
    /// (tool, template) pair, with TEXT columns in template field order.
    pub async fn init_schema(&self, registry: &TemplateRegistry) -> StoreResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS scopes (platform TEXT NOT NULL, scope TEXT NOT NULL)")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Schema)?;

        for (tool, name, template) in registry.iter() {
            let table = table_identity(tool, name)?;
            let columns = column_list(template)?;
            let body = columns
                .iter()
                .map(|c| format!("{c} TEXT"))
                .collect::<Vec<_>>()
                .join(", ");

            let sql = format!("CREATE TABLE IF NOT EXISTS {table} ({body})");
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(StoreError::Schema)?;
        }

        Ok(())
    }

    /// Ingest one cleaned file as a single all-or-nothing transaction.
    pub async fn ingest_file(
        &self,
        path: &Path,
        registry: &TemplateRegistry,
    ) -> StoreResult<IngestReport> {
        let (tool, template_name) = derive_identity(path, registry)?;
        let template = registry.template(&tool, &template_name).ok_or_else(|| {
            StoreError::UnknownTemplate {
                tool: tool.to_string(),
                template: template_name.clone(),
                file: path.to_path_buf(),
            }
        })?;

        let table = table_identity(&tool, &template_name)?;
        let columns = column_list(template)?;
        let sql = insert_sql(&table, &columns, self.dialect);

        let content = fs::read_to_string(path).map_err(|e| StoreError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let insert_err = |e: sqlx::Error| StoreError::Insert {
            table: table.clone(),
            file: path.to_path_buf(),
            source: e,
        };

        let mut tx = self.pool.begin().await.map_err(insert_err)?;
        let mut rows = 0usize;

        for (idx, line) in content.lines().enumerate() {
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
            if fields.len() != columns.len() {
                tx.rollback().await.ok();
                return Err(StoreError::ColumnMismatch {
                    file: path.to_path_buf(),
                    table,
                    line: idx + 1,
                    expected: columns.len(),
                    found: fields.len(),
                });
            }

            let mut query = sqlx::query(&sql);
            for field in &fields {
                query = query.bind(*field);
            }

            if let Err(e) = query.execute(&mut *tx).await {
                tx.rollback().await.ok();
                return Err(insert_err(e));
            }
            rows += 1;
        }

        tx.commit().await.map_err(insert_err)?;

        debug!(table = %table, rows, file = %path.display(), "cleaned file ingested");
        Ok(IngestReport {
            table,
            rows,
            file: path.to_path_buf(),
        })
    }

    /// Record a scope string for a platform.
    pub async fn insert_scope(&self, platform: &str, scope: &str) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO scopes (platform, scope) VALUES ({})",
            self.dialect.placeholders(2)
        );
        sqlx::query(&sql)
            .bind(platform)
            .bind(scope)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }

    /// List the scopes recorded for a platform.
    pub async fn list_scopes(&self, platform: &str) -> StoreResult<Vec<String>> {
        let sql = format!(
            "SELECT scope FROM scopes WHERE platform = {}",
            self.dialect.placeholder(1)
        );
        let rows = sqlx::query(&sql)
            .bind(platform)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }
}

/// Reject anything that cannot be safely interpolated as an identifier.
fn validate_identifier(s: &str) -> StoreResult<()> {
    let valid = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(s.to_string()))
    }
}

/// Table identity `<tool>_<templateName>`.
fn table_identity(tool: &ToolId, template_name: &str) -> StoreResult<String> {
    let table = format!("{}_{}", tool, template_name);
    validate_identifier(&table)?;
    Ok(table)
}

/// Validated column list in template field order.
fn column_list(template: &Template) -> StoreResult<Vec<String>> {
    for field in &template.fields {
        validate_identifier(field)?;
    }
    Ok(template.fields.clone())
}

/// Recover (tool, template) from a cleaned file name.
///
/// The cleaner appends `_clean_<template>` last, so the split is anchored
/// at the rightmost marker; the tool prefix resolves with the same
/// longest-match rule the cleaner uses.
fn derive_identity(path: &Path, registry: &TemplateRegistry) -> StoreResult<(ToolId, String)> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (base, template_name) = stem
        .rsplit_once(CLEAN_MARKER)
        .ok_or_else(|| StoreError::BadFileName(path.to_path_buf()))?;

    let tool = registry
        .resolve_tool(base)
        .ok_or_else(|| StoreError::UnresolvedTool(path.to_path_buf()))?
        .clone();

    Ok((tool, template_name.to_string()))
}

/// Parameterized INSERT with one placeholder per column.
fn insert_sql(table: &str, columns: &[String], dialect: SqlDialect) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        dialect.placeholders(columns.len())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::from_json(
            r#"{
                "nmap": {
                    "open_ports": {
                        "regex": "^(\\w+) (\\d+)/(tcp|udp) (\\w+)$",
                        "fields": ["state", "port", "proto", "service"]
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn memory_settings() -> DatabaseSettings {
        DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            dialect: None,
            max_connections: 1,
        }
    }

    fn write_cleaned(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{body}").unwrap();
        path
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("nmap_open_ports").is_ok());
        assert!(validate_identifier("scopes").is_ok());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("drop table x; --").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_derive_identity() {
        let registry = registry();
        let path = Path::new("nmap_a.com_20260101000000_clean_open_ports.txt");
        let (tool, template) = derive_identity(path, &registry).unwrap();
        assert_eq!(tool.as_str(), "nmap");
        assert_eq!(template, "open_ports");
    }

    #[test]
    fn test_derive_identity_rejects_plain_files() {
        let registry = registry();
        assert!(matches!(
            derive_identity(Path::new("notes.txt"), &registry),
            Err(StoreError::BadFileName(_))
        ));
        assert!(matches!(
            derive_identity(Path::new("masscan_a_clean_open_ports.txt"), &registry),
            Err(StoreError::UnresolvedTool(_))
        ));
    }

    #[test]
    fn test_insert_sql_per_dialect() {
        let cols = vec!["state".to_string(), "port".to_string()];
        assert_eq!(
            insert_sql("nmap_open_ports", &cols, SqlDialect::Postgres),
            "INSERT INTO nmap_open_ports (state, port) VALUES ($1, $2)"
        );
        assert_eq!(
            insert_sql("nmap_open_ports", &cols, SqlDialect::Sqlite),
            "INSERT INTO nmap_open_ports (state, port) VALUES (?, ?)"
        );
    }

    #[tokio::test]
    async fn test_connect_ping_and_scopes_roundtrip() {
        let store = Store::connect(&memory_settings()).await.unwrap();
        assert_eq!(store.dialect(), SqlDialect::Sqlite);

        store.init_schema(&registry()).await.unwrap();
        store.insert_scope("hackerone", "*.acme.com").await.unwrap();
        store.insert_scope("hackerone", "api.acme.com").await.unwrap();
        store.insert_scope("bugcrowd", "other.io").await.unwrap();

        let scopes = store.list_scopes("hackerone").await.unwrap();
        assert_eq!(scopes, ["*.acme.com", "api.acme.com"]);
    }

    #[tokio::test]
    async fn test_connect_failure_is_distinguishable() {
        let settings = DatabaseSettings {
            url: "sqlite:///definitely/missing/dir/autohunt.db".to_string(),
            dialect: None,
            max_connections: 1,
        };
        assert!(matches!(
            Store::connect(&settings).await,
            Err(StoreError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn test_ingest_commits_all_rows() {
        let registry = registry();
        let store = Store::connect(&memory_settings()).await.unwrap();
        store.init_schema(&registry).await.unwrap();

        let dir = TempDir::new().unwrap();
        let file = write_cleaned(
            &dir,
            "nmap_a.com_20260101000000_clean_open_ports.txt",
            "open|80|tcp|http\nclosed|22|tcp|ssh\n",
        );

        let report = store.ingest_file(&file, &registry).await.unwrap();
        assert_eq!(report.table, "nmap_open_ports");
        assert_eq!(report.rows, 2);
    }

    #[tokio::test]
    async fn test_ingest_rolls_back_whole_file_on_bad_row() {
        let registry = registry();
        let store = Store::connect(&memory_settings()).await.unwrap();
        store.init_schema(&registry).await.unwrap();

        let dir = TempDir::new().unwrap();
        let file = write_cleaned(
            &dir,
            "nmap_b.com_20260101000000_clean_open_ports.txt",
            "open|80|tcp|http\nshort|row\nclosed|22|tcp|ssh\n",
        );

        let err = store.ingest_file(&file, &registry).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ColumnMismatch { line: 2, expected: 4, found: 2, .. }
        ));

        // Nothing from the failed file may be visible.
        let rows = sqlx::query("SELECT COUNT(*) FROM nmap_open_ports")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows.get::<i64, _>(0), 0);
    }

    #[tokio::test]
    async fn test_ingest_skips_blank_lines() {
        let registry = registry();
        let store = Store::connect(&memory_settings()).await.unwrap();
        store.init_schema(&registry).await.unwrap();

        let dir = TempDir::new().unwrap();
        let file = write_cleaned(
            &dir,
            "nmap_c.com_20260101000000_clean_open_ports.txt",
            "open|80|tcp|http\n\nclosed|22|tcp|ssh\n",
        );

        let report = store.ingest_file(&file, &registry).await.unwrap();
        assert_eq!(report.rows, 2);
    }
}
