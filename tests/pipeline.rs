//! End-to-end pipeline tests against a file-backed SQLite database:
//! clean → store for single files, and orchestrated plans with per-item
//! failure isolation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use sqlx::Row;
use tempfile::TempDir;

use autohunt::cleaner::Cleaner;
use autohunt::config::{
    DatabaseSettings, PathSettings, ScannerSettings, Settings, ToolEntry,
};
use autohunt::orchestrator::{Orchestrator, Plan, PlanStep, RunStatus, StepKind, StepStatus};
use autohunt::registry::TemplateRegistry;
use autohunt::store::{self, Store};
use autohunt::types::{ArtifactFormat, ToolId};

const REGISTRY: &str = r#"{
    "nmap": {
        "open_ports": {
            "regex": "^(\\w+) (\\d+)/(tcp|udp) (\\w+)$",
            "fields": ["state", "port", "proto", "service"]
        }
    },
    "badtool": {
        "broken": { "regex": "([unclosed", "fields": ["x"] }
    }
}"#;

/// Settings with every path and the database rooted under `dir`.
fn settings_in(dir: &Path) -> Settings {
    let mut tools = BTreeMap::new();
    tools.insert(
        ToolId::new("nmap").unwrap(),
        ToolEntry {
            args: String::new(),
            format: ArtifactFormat::Text,
            template: "open_ports".to_string(),
        },
    );
    tools.insert(
        ToolId::new("badtool").unwrap(),
        ToolEntry {
            args: String::new(),
            format: ArtifactFormat::Text,
            template: "broken".to_string(),
        },
    );

    let registry_file = dir.join("templates.json");
    fs::write(&registry_file, REGISTRY).unwrap();

    Settings {
        paths: PathSettings {
            raw_dir: dir.join("raw"),
            cleaned_dir: dir.join("cleaned"),
            log_dir: dir.join("logs"),
            targets_file: dir.join("targets.txt"),
            registry_file,
        },
        database: DatabaseSettings {
            url: format!("sqlite://{}/autohunt.db?mode=rwc", dir.display()),
            dialect: None,
            max_connections: 2,
        },
        scanner: ScannerSettings {
            workers: 2,
            timeout_secs: 5,
        },
        tools,
    }
}

async fn count_rows(url: &str, table: &str) -> i64 {
    store::install_drivers();
    let pool = sqlx::any::AnyPoolOptions::new().connect(url).await.unwrap();
    sqlx::query(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&pool)
        .await
        .unwrap()
        .get::<i64, _>(0)
}

#[tokio::test]
async fn clean_then_store_roundtrip() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    fs::create_dir_all(&settings.paths.raw_dir).unwrap();

    let raw = settings.paths.raw_dir.join("nmap_a.com_20260101000000.txt");
    fs::write(
        &raw,
        "Starting scan of a.com\nopen 80/tcp http\nclosed 22/tcp ssh\nDone.\n",
    )
    .unwrap();

    let registry = TemplateRegistry::from_file(&settings.paths.registry_file).unwrap();
    let cleaner = Cleaner::new(&registry, settings.paths.cleaned_dir.clone());
    let cleaned = cleaner.clean_file(&raw, "open_ports").unwrap();

    assert_eq!(cleaned.records, 2);
    let body = fs::read_to_string(&cleaned.path).unwrap();
    assert_eq!(body, "open|80|tcp|http\nclosed|22|tcp|ssh\n");

    let store = Store::connect(&settings.database).await.unwrap();
    store.init_schema(&registry).await.unwrap();
    let report = store.ingest_file(&cleaned.path, &registry).await.unwrap();

    assert_eq!(report.table, "nmap_open_ports");
    assert_eq!(report.rows, 2);
    assert_eq!(count_rows(&settings.database.url, "nmap_open_ports").await, 2);
}

#[tokio::test]
async fn bad_row_rolls_back_the_whole_file() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    fs::create_dir_all(&settings.paths.cleaned_dir).unwrap();

    let file = settings
        .paths
        .cleaned_dir
        .join("nmap_b.com_20260101000000_clean_open_ports.txt");
    fs::write(&file, "open|80|tcp|http\ntruncated|row\nclosed|22|tcp|ssh\n").unwrap();

    let registry = TemplateRegistry::from_file(&settings.paths.registry_file).unwrap();
    let store = Store::connect(&settings.database).await.unwrap();
    store.init_schema(&registry).await.unwrap();

    assert!(store.ingest_file(&file, &registry).await.is_err());
    assert_eq!(count_rows(&settings.database.url, "nmap_open_ports").await, 0);
}

#[tokio::test]
async fn best_effort_clean_failure_does_not_stop_store() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    fs::create_dir_all(&settings.paths.raw_dir).unwrap();

    // Two artifacts clean fine; the third belongs to a tool whose template
    // has an unusable regex, so cleaning it fails.
    fs::write(
        settings.paths.raw_dir.join("nmap_a.com_20260101000000.txt"),
        "open 80/tcp http\n",
    )
    .unwrap();
    fs::write(
        settings.paths.raw_dir.join("nmap_b.com_20260101000000.txt"),
        "open 443/tcp https\nclosed 21/tcp ftp\n",
    )
    .unwrap();
    fs::write(
        settings.paths.raw_dir.join("badtool_c.com_20260101000000.txt"),
        "whatever\n",
    )
    .unwrap();

    let plan = Plan {
        platform: "hackerone".to_string(),
        task: "clean_and_store".to_string(),
        steps: vec![
            PlanStep {
                step: StepKind::CleanResults,
                description: String::new(),
            },
            PlanStep {
                step: StepKind::StoreResults,
                description: String::new(),
            },
        ],
        data: HashMap::new(),
    };

    let summary = Orchestrator::new(&settings).run(&plan).await.unwrap();
    assert_eq!(summary.status, RunStatus::Completed);

    let clean = summary.entry("CleanResults").unwrap();
    assert_eq!(clean.status, StepStatus::Success);
    let items = clean.items.unwrap();
    assert_eq!((items.succeeded, items.failed), (2, 1));

    let store = summary.entry("StoreResults").unwrap();
    let items = store.items.unwrap();
    assert_eq!((items.succeeded, items.failed), (2, 0));

    // All three rows from the two cleaned files landed.
    assert_eq!(count_rows(&settings.database.url, "nmap_open_ports").await, 3);
}

#[tokio::test]
async fn hard_failure_skips_remaining_steps() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    // No targets file on disk: CollectTargets is a hard failure.

    let plan = Plan {
        platform: "hackerone".to_string(),
        task: "full_hunt".to_string(),
        steps: vec![
            PlanStep {
                step: StepKind::CollectTargets,
                description: String::new(),
            },
            PlanStep {
                step: StepKind::CleanResults,
                description: String::new(),
            },
        ],
        data: HashMap::new(),
    };

    let summary = Orchestrator::new(&settings).run(&plan).await.unwrap();
    assert_eq!(summary.status, RunStatus::Failed);

    let collect = summary.entry("CollectTargets").unwrap();
    assert_eq!(collect.status, StepStatus::Failed);
    assert!(collect.error.is_some());
    assert!(summary.entry("CleanResults").is_none());

    // The structured summary and the run log are persisted even on failure.
    let summary_file = settings
        .paths
        .log_dir
        .join(format!("summary_{}.json", summary.run_id));
    assert!(summary_file.exists());
    assert!(settings.paths.log_dir.join("run.log").exists());
}

#[tokio::test]
async fn scope_steps_roundtrip_through_a_plan() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());

    let plan = Plan {
        platform: "bugcrowd".to_string(),
        task: "register_scope".to_string(),
        steps: vec![
            PlanStep {
                step: StepKind::InsertScope,
                description: String::new(),
            },
            PlanStep {
                step: StepKind::ListScopes,
                description: String::new(),
            },
        ],
        data: HashMap::from([("scope".to_string(), "*.acme.com".to_string())]),
    };

    let summary = Orchestrator::new(&settings).run(&plan).await.unwrap();
    assert_eq!(summary.status, RunStatus::Completed);

    let store = Store::connect(&settings.database).await.unwrap();
    let scopes = store.list_scopes("bugcrowd").await.unwrap();
    assert_eq!(scopes, ["*.acme.com"]);
}
