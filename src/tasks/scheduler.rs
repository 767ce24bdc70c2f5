use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::core::state::AppState;
use crate::tasks::sweeper;

/// Runs the background sweep loops until a shutdown signal arrives, then
/// waits for them to drain.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(2);
    handles.push(tokio::spawn(job_sweep_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(attempt_sweep_loop(state.clone(), shutdown_rx.clone())));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn job_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.settings().generation().job_sweep_interval_seconds.max(1);
    let mut tick = interval(Duration::from_secs(period));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeper::sweep_generation_jobs(&state).await {
                    tracing::error!(error = %err, "sweep_generation_jobs failed");
                }
            }
        }
    }
}

async fn attempt_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.settings().quiz().attempt_sweep_interval_seconds.max(1);
    let mut tick = interval(Duration::from_secs(period));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeper::sweep_stale_attempts(&state).await {
                    tracing::error!(error = %err, "sweep_stale_attempts failed");
                }
            }
        }
    }
}
