//! Periodic update driver on a `tokio` interval.

use crate::host::Muster;
use muster_core::MusterError;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;

/// Call [`Muster::tick_all`] every `period` until `shutdown` resolves or the
/// engine shuts down. Returns the number of completed passes.
///
/// The first pass runs immediately. Passes that overrun the period delay
/// the next one instead of bunching up.
///
/// ```rust,ignore
/// let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
/// tokio::spawn(run_update_loop(core.clone(), core.config().update_period(), async {
///     let _ = stop_rx.await;
/// }));
/// ```
pub async fn run_update_loop<F>(core: Arc<Muster>, period: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(passes, "update loop stopped");
                break;
            }
            _ = interval.tick() => {
                match core.tick_all().await {
                    Ok(ended) => {
                        passes += 1;
                        for (id, reason) in ended {
                            tracing::debug!(activity = %id, %reason, "ended by update tick");
                        }
                    }
                    Err(MusterError::Shutdown) => {
                        tracing::debug!(passes, "engine shut down, update loop exiting");
                        break;
                    }
                    Err(err) => tracing::warn!(error = %err, "update pass failed"),
                }
            }
        }
    }
    passes
}
