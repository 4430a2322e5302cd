use std::future::Future;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::interval;

use crate::core::state::AppState;
use crate::tasks::maintenance;

/// Runs the maintenance sweeps until a shutdown signal arrives. Each sweep
/// gets its own loop so a slow pass in one never delays the others.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![
        tokio::spawn(sweep_loop(
            state.clone(),
            shutdown_rx.clone(),
            "close_expired_section_attempts",
            |state| async move { maintenance::close_expired_section_attempts(&state).await },
        )),
        tokio::spawn(sweep_loop(
            state.clone(),
            shutdown_rx.clone(),
            "reset_stale_reviews",
            |state| async move { maintenance::reset_stale_reviews(&state).await },
        )),
        tokio::spawn(sweep_loop(
            state.clone(),
            shutdown_rx,
            "finalize_pending_attempts",
            |state| async move { maintenance::finalize_pending_attempts(&state).await },
        )),
    ];

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

/// Sweeps report their own progress; only failures are logged here.
async fn sweep_loop<F, Fut>(
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
    name: &'static str,
    sweep: F,
) where
    F: Fn(AppState) -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    let mut tick = interval(state.settings().exam().sweep_interval());
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweep(state.clone()).await {
                    tracing::error!(error = %err, "{name} failed");
                }
            }
        }
    }
}
