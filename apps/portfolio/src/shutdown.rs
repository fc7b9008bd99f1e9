//! Graceful shutdown handling.

use std::time::Duration;
use tokio::signal;

/// How long in-flight requests may take to drain after a shutdown signal.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for Ctrl-C or, on Unix, SIGTERM.
///
/// If a handler cannot be installed that signal source is ignored and the
/// other one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

/// Resolve when `signal` fires, then exit the process with status 1 if the
/// server is still running `deadline` later.
pub async fn with_deadline<F>(signal: F, deadline: Duration)
where
    F: std::future::Future<Output = ()>,
{
    signal.await;
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        tracing::error!(?deadline, "forced shutdown after timeout");
        std::process::exit(1);
    });
}
