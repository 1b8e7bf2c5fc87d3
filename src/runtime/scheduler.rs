//! Timers that run independently of tick arrival.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{now_ms, ScannerEngine};

/// Rebuild the recommendation list every `period` until shutdown.
pub fn spawn_scan_loop(
    engine: Arc<ScannerEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.run_scan(now_ms()) {
                        Ok(list) => tracing::debug!(count = list.len(), "Recommendations refreshed"),
                        Err(e) => {
                            tracing::error!(error = %e, "Scan failed");
                            engine.record_error(&e);
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Scan loop stopped");
    })
}

/// Remove idle symbols every `period` until shutdown.
pub fn spawn_cleanup_loop(
    engine: Arc<ScannerEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing can be idle yet.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.sweep_inactive(now_ms()) {
                        Ok(removed) if !removed.is_empty() => {
                            tracing::info!(removed = ?removed, "Swept inactive symbols");
                        }
                        Ok(_) => {}
                        Err(e) => engine.record_error(&e),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Cleanup loop stopped");
    })
}
