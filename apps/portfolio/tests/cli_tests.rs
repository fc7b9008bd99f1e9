//! Integration tests for portfolio CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use portfolio::cli::{CliError, cmd_check_port, cmd_init, cmd_status};
use portfolio::probe::{PortProbe, PortStatus};
use portfolio_core::Store;
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write a small seed file with one partition, one project and a link.
fn create_seed_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("seed.json");
    let content = r#"{
        "partitions": [
            {"id": "web", "slug": "web", "name": "Web", "sortOrder": 1}
        ],
        "projects": [
            {
                "id": "alpha",
                "slug": "alpha",
                "name": "Alpha",
                "status": "active",
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z",
                "inPortfolio": true
            },
            {
                "id": "beta",
                "slug": "beta",
                "name": "Beta",
                "status": "archived",
                "createdAt": "2024-02-01T00:00:00.000Z",
                "updatedAt": "2024-02-01T00:00:00.000Z"
            }
        ],
        "projectPartitions": [
            {"projectId": "alpha", "partitionId": "web", "isFeatured": true, "sortOrder": 0}
        ]
    }"#;
    std::fs::write(&path, content).unwrap();
    path
}

struct Listening(u16);

#[async_trait]
impl PortProbe for Listening {
    async fn status(&self, port: u16) -> PortStatus {
        if port == self.0 {
            PortStatus::listening(Some(777))
        } else {
            PortStatus::free()
        }
    }
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_init_creates_database_with_default_ports() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");
    let missing = temp.path().join("missing.json");

    let report = cmd_init(&db_path, &[missing], false).unwrap();
    assert!(db_path.exists());
    assert_eq!(report.ports, 22);
    assert_eq!(report.partitions, 0);
    assert!(report.source.is_none());
}

#[test]
fn test_init_loads_seed_file() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");
    let seed = create_seed_file(&temp);

    let report = cmd_init(&db_path, &[temp.path().join("nope.json"), seed.clone()], false).unwrap();
    assert_eq!(report.partitions, 1);
    assert_eq!(report.projects, 2);
    assert_eq!(report.project_partitions, 1);
    assert_eq!(report.source, Some(seed));

    let store = Store::open(&db_path).unwrap();
    let beta = store.projects().get("beta").unwrap().unwrap();
    assert!(!beta.in_portfolio);
    assert_eq!(beta.created_at, "2024-02-01T00:00:00.000Z");
    let alpha = store.projects().get("alpha").unwrap().unwrap();
    assert!(alpha.in_portfolio);
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");

    cmd_init(&db_path, &[], false).unwrap();

    let result = cmd_init(&db_path, &[], false);
    assert!(matches!(result, Err(CliError::AlreadyExists(_))));
}

#[test]
fn test_init_succeeds_with_force() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");
    let seed = create_seed_file(&temp);

    cmd_init(&db_path, &[seed.clone()], false).unwrap();
    Store::open(&db_path)
        .unwrap()
        .traffic()
        .record_click(None, None)
        .unwrap();

    let report = cmd_init(&db_path, &[seed], true).unwrap();
    assert_eq!(report.ports, 22);
    assert_eq!(report.partitions, 1);

    let counts = Store::open(&db_path).unwrap().counts().unwrap();
    assert_eq!(counts.traffic_logs, 0);
}

// =============================================================================
// STATUS COMMAND TESTS
// =============================================================================

#[test]
fn test_status_counts_rows() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");
    let seed = create_seed_file(&temp);
    cmd_init(&db_path, &[seed], false).unwrap();

    let counts = cmd_status(&db_path, false).unwrap();
    assert_eq!(counts.ports, 22);
    assert_eq!(counts.partitions, 1);
    assert_eq!(counts.projects, 2);
    assert_eq!(counts.project_partitions, 1);
    assert_eq!(counts.traffic_logs, 0);

    let json = cmd_status(&db_path, true).unwrap();
    assert_eq!(json, counts);
}

#[test]
fn test_status_requires_existing_database() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("absent.db");

    let result = cmd_status(&db_path, false);
    assert!(matches!(result, Err(CliError::NotFound(_))));
    assert!(!db_path.exists());
}

// =============================================================================
// CHECK-PORT COMMAND TESTS
// =============================================================================

#[tokio::test]
async fn test_check_port_reports_reservation() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");
    cmd_init(&db_path, &[], false).unwrap();

    let check = cmd_check_port(&db_path, 3000, true, &Listening(0))
        .await
        .unwrap();
    assert!(check.reserved);
    assert!(!check.available);
    assert_eq!(check.reservation.unwrap().id, "portfolio-backend");
}

#[tokio::test]
async fn test_check_port_reports_listener() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");
    cmd_init(&db_path, &[], false).unwrap();

    let busy = cmd_check_port(&db_path, 9100, false, &Listening(9100))
        .await
        .unwrap();
    assert!(busy.in_use);
    assert_eq!(busy.pid, Some(777));
    assert!(!busy.available);

    let free = cmd_check_port(&db_path, 9101, false, &Listening(9100))
        .await
        .unwrap();
    assert!(free.available);
}

#[tokio::test]
async fn test_check_port_rejects_out_of_range() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("portfolio.db");

    for port in [0, -1, 65_536] {
        let result = cmd_check_port(&db_path, port, false, &Listening(0)).await;
        assert!(matches!(result, Err(CliError::InvalidPort(p)) if p == port));
    }
}
