use tokio_util::sync::CancellationToken;

/// Wait for SIGINT (Ctrl-C) or SIGTERM, then cancel `token`.
///
/// If the signal handlers cannot be installed the token is cancelled at once,
/// so the server never runs without a way to stop it.
pub async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                token.cancel();
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Received SIGINT, shutting down");
    }

    token.cancel();
}
