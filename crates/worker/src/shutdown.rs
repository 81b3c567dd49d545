//! SIGINT / SIGTERM handling.

use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first SIGINT or SIGTERM; exit on the second.
///
/// In-flight records finish their current step; records not yet started
/// are skipped and staged results are still written.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return;
        }
        tracing::warn!("Shutdown signal received, finishing in-flight records (signal again to abort)");
        token.cancel();

        if shutdown_signal().await.is_ok() {
            tracing::warn!("Second shutdown signal received, aborting");
            std::process::exit(130);
        }
    });
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
