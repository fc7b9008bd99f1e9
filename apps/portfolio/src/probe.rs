//! # Port Probing
//!
//! Answers whether something is listening on a TCP port right now.
//!
//! [`SystemProbe`] asks `lsof` for the listening PID and falls back to a bind
//! attempt when `lsof` is unavailable. Handlers take the probe as a trait
//! object so tests can substitute a fixed answer.

use async_trait::async_trait;
use portfolio_core::{Port, Store, StoreError};
use serde::Serialize;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::task::JoinSet;

/// Upper bound on a single `lsof` invocation.
const LSOF_TIMEOUT: Duration = Duration::from_secs(3);

/// Live status of a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortStatus {
    pub in_use: bool,
    pub pid: Option<u32>,
}

impl PortStatus {
    #[must_use]
    pub const fn free() -> Self {
        Self {
            in_use: false,
            pid: None,
        }
    }

    #[must_use]
    pub const fn listening(pid: Option<u32>) -> Self {
        Self { in_use: true, pid }
    }
}

/// Something that can tell whether a port has a listener.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn status(&self, port: u16) -> PortStatus;
}

/// Probe backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

#[async_trait]
impl PortProbe for SystemProbe {
    async fn status(&self, port: u16) -> PortStatus {
        match lsof_pid(port).await {
            Ok(Some(pid)) => PortStatus::listening(Some(pid)),
            Ok(None) => PortStatus::free(),
            Err(e) => {
                tracing::debug!(port, error = %e, "lsof unavailable, probing with bind");
                bind_probe(port).await
            }
        }
    }
}

/// Run `lsof -nP -iTCP:<port> -sTCP:LISTEN -t` and return the first PID.
///
/// `lsof` exits non-zero when nothing matches, so only spawn failures and
/// timeouts are errors.
async fn lsof_pid(port: u16) -> std::io::Result<Option<u32>> {
    let filter = format!("-iTCP:{port}");
    let mut command = Command::new("lsof");
    command
        .args(["-nP", filter.as_str(), "-sTCP:LISTEN", "-t"])
        .kill_on_drop(true);
    let output = tokio::time::timeout(LSOF_TIMEOUT, command.output())
        .await
        .map_err(|_| std::io::Error::new(ErrorKind::TimedOut, "lsof timed out"))??;
    Ok(parse_lsof_pid(&String::from_utf8_lossy(&output.stdout)))
}

/// The first PID in `lsof -t` output.
#[must_use]
pub fn parse_lsof_pid(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse().ok())
}

/// Try to bind `0.0.0.0:<port>`; `AddrInUse` means something holds it.
async fn bind_probe(port: u16) -> PortStatus {
    match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => {
            drop(listener);
            PortStatus::free()
        }
        Err(e) if e.kind() == ErrorKind::AddrInUse => PortStatus::listening(None),
        Err(e) => {
            tracing::debug!(port, error = %e, "bind probe failed");
            PortStatus::free()
        }
    }
}

/// Probe a stored port number; numbers outside the TCP range are never in use.
pub async fn status_of(probe: &dyn PortProbe, port_number: i64) -> PortStatus {
    match u16::try_from(port_number) {
        Ok(port) if port > 0 => probe.status(port).await,
        _ => PortStatus::free(),
    }
}

/// Probe many ports concurrently, preserving input order.
pub async fn statuses(probe: &Arc<dyn PortProbe>, port_numbers: &[i64]) -> Vec<PortStatus> {
    let mut tasks = JoinSet::new();
    for (index, &number) in port_numbers.iter().enumerate() {
        let probe = Arc::clone(probe);
        tasks.spawn(async move { (index, status_of(probe.as_ref(), number).await) });
    }

    let mut results = vec![PortStatus::free(); port_numbers.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, status)) => results[index] = status,
            Err(e) => tracing::warn!(error = %e, "port probe task failed"),
        }
    }
    results
}

// =============================================================================
// CONFLICT CHECK
// =============================================================================

/// Reservation and live status of one port number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortCheck {
    pub port_number: i64,
    pub available: bool,
    pub reserved: bool,
    pub reservation: Option<Port>,
    pub in_use: bool,
    pub pid: Option<u32>,
}

/// A port is available when it is neither reserved nor listening.
pub async fn check_port(
    store: &Store,
    probe: &dyn PortProbe,
    port_number: i64,
) -> Result<PortCheck, StoreError> {
    let reservation = store.ports().get_by_number(port_number)?;
    let status = status_of(probe, port_number).await;
    let reserved = reservation.is_some();
    Ok(PortCheck {
        port_number,
        available: !reserved && !status.in_use,
        reserved,
        reservation,
        in_use: status.in_use,
        pid: status.pid,
    })
}

// =============================================================================
// TESTS
// =============================================================================
