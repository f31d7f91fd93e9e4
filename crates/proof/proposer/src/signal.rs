//! Signal handling for graceful shutdown.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spawns a task that cancels `cancel` on SIGINT or SIGTERM.
///
/// SIGTERM is only observed on unix. If a handler cannot be registered the
/// failure is logged and the token is cancelled, since the process could
/// otherwise never be stopped cleanly.
pub fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!(error = %e, "Failed to register SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => error!(error = %e, "Failed to listen for SIGINT"),
        },
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => error!(error = %e, "Failed to listen for SIGINT"),
    }
}
