use tokio::signal;

/// Resolves when the process is told to stop: Ctrl+C anywhere, SIGTERM on
/// unix (what container runtimes send before the kill).
pub(crate) async fn shutdown_signal() {
    let signal_name = tokio::select! {
        _ = ctrl_c() => "ctrl_c",
        _ = sigterm() => "sigterm",
    };

    tracing::info!(signal = signal_name, "shutdown signal received");
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
