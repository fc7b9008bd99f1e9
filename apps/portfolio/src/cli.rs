//! # CLI Commands
//!
//! Each `cmd_*` function backs one subcommand. They print human-readable or
//! JSON output to stdout and return the underlying value for callers and
//! tests.

use crate::api::{self, AppState};
use crate::config::ServeArgs;
use crate::probe::{self, PortCheck, PortProbe, SystemProbe};
use crate::shutdown;
use portfolio_core::{SeedReport, Store, StoreError, TableCounts, validate_port_number};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database already exists at {} (use --force to replace it)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("database not found at {} (run `portfolio init` first)", .0.display())]
    NotFound(PathBuf),

    #[error("invalid port number {0}: must be between 1 and 65535")]
    InvalidPort(i64),

    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
}

// =============================================================================
// SERVE
// =============================================================================

/// Open the database, seed it, and serve the API until a shutdown signal.
pub async fn cmd_serve(
    db_path: &Path,
    seeds: &[PathBuf],
    args: &ServeArgs,
) -> Result<(), CliError> {
    let store = Store::open(db_path)?;
    let report = store.seed_defaults(seeds);
    tracing::debug!(?report, "seeding finished");

    let state = AppState::new(store, Arc::new(SystemProbe), &args.public_dir)
        .with_cors_origins(args.cors_origins())
        .with_api_key(args.api_key.clone())
        .with_rate_limit(args.rate_limit);
    tokio::fs::create_dir_all(state.screenshots_dir()).await?;

    let addr = args.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        database = %db_path.display(),
        auth = args.api_key.is_some(),
        "server listening"
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown::with_deadline(
            shutdown::shutdown_signal(),
            shutdown::DRAIN_TIMEOUT,
        ))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

// =============================================================================
// INIT / STATUS
// =============================================================================

/// Create a database and seed ports and content.
///
/// Refuses to touch an existing file unless `force` is set, in which case the
/// file is removed first.
pub fn cmd_init(db_path: &Path, seeds: &[PathBuf], force: bool) -> Result<SeedReport, CliError> {
    if db_path.exists() {
        if !force {
            return Err(CliError::AlreadyExists(db_path.to_path_buf()));
        }
        std::fs::remove_file(db_path)?;
    }

    let store = Store::open(db_path)?;
    let report = store.seed_defaults(seeds);

    println!("Initialized database at {}", db_path.display());
    println!("  ports:              {}", report.ports);
    println!("  partitions:         {}", report.partitions);
    println!("  projects:           {}", report.projects);
    println!("  project partitions: {}", report.project_partitions);
    match &report.source {
        Some(source) => println!("  seed file:          {}", source.display()),
        None => println!("  seed file:          (none)"),
    }
    Ok(report)
}

/// Print row counts for every table.
pub fn cmd_status(db_path: &Path, json: bool) -> Result<TableCounts, CliError> {
    if !db_path.exists() {
        return Err(CliError::NotFound(db_path.to_path_buf()));
    }
    let counts = Store::open(db_path)?.counts()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        println!("Database: {}", db_path.display());
        println!("  partitions:         {}", counts.partitions);
        println!("  projects:           {}", counts.projects);
        println!("  project partitions: {}", counts.project_partitions);
        println!("  ports:              {}", counts.ports);
        println!("  traffic logs:       {}", counts.traffic_logs);
    }
    Ok(counts)
}

// =============================================================================
// CHECK PORT
// =============================================================================

/// Report the reservation and live status of `port`.
pub async fn cmd_check_port(
    db_path: &Path,
    port: i64,
    json: bool,
    probe: &dyn PortProbe,
) -> Result<PortCheck, CliError> {
    if !validate_port_number(port) {
        return Err(CliError::InvalidPort(port));
    }
    let store = Store::open(db_path)?;
    let check = probe::check_port(&store, probe, port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else {
        let verdict = if check.available { "available" } else { "unavailable" };
        println!("Port {}: {verdict}", check.port_number);
        match &check.reservation {
            Some(reservation) => println!(
                "  reserved by {} ({})",
                reservation.id, reservation.server_type
            ),
            None => println!("  not reserved"),
        }
        match (check.in_use, check.pid) {
            (true, Some(pid)) => println!("  listening (pid {pid})"),
            (true, None) => println!("  listening"),
            (false, _) => println!("  no listener"),
        }
    }
    Ok(check)
}
