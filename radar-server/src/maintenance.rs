//! Background maintenance
//!
//! Periodically times out consultations that stayed `running` past the
//! configured horizon, so abandoned provider jobs do not linger forever.

use std::sync::Arc;
use std::time::Duration;

use radar_core::Orchestrator;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn the expiry sweep. The first sweep runs immediately.
pub fn spawn_expiry_sweeper(
    orchestrator: Arc<Orchestrator>,
    stale_after: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep_once(&orchestrator, stale_after).await;
        }
    })
}

/// Run one sweep, returning how many requests were timed out.
pub async fn sweep_once(orchestrator: &Orchestrator, stale_after: Duration) -> usize {
    match orchestrator.expire_stale(stale_after).await {
        Ok(expired) if !expired.is_empty() => {
            tracing::info!(count = expired.len(), "Expired stale consultations");
            expired.len()
        }
        Ok(_) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Stale consultation sweep failed");
            0
        }
    }
}
