//! Periodic sync passes

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use mail::{SyncEngine, SyncError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run a sync pass every `period`, starting immediately
///
/// A tick that lands while another pass (for example one triggered over
/// HTTP) is still running is skipped.
pub fn spawn(engine: Arc<SyncEngine>, period: Duration) -> JoinHandle<()> {
    info!("[SCHED] Syncing every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            run_pass(engine.clone()).await;
        }
    })
}

/// How a scheduled tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassOutcome {
    Finished,
    /// Another pass held the engine; the tick was dropped
    Skipped,
    Failed,
}

async fn run_pass(engine: Arc<SyncEngine>) -> PassOutcome {
    match tokio::task::spawn_blocking(move || engine.sync()).await {
        Ok(Ok(report)) => {
            debug!("[SCHED] Pass finished, added {}", report.added);
            PassOutcome::Finished
        }
        Ok(Err(SyncError::AlreadyRunning)) => {
            debug!("[SCHED] Pass already running, skipping tick");
            PassOutcome::Skipped
        }
        Ok(Err(e)) => {
            warn!("[SCHED] Sync failed: {}", e);
            PassOutcome::Failed
        }
        Err(e) => {
            error!("[SCHED] Sync worker panicked: {}", e);
            PassOutcome::Failed
        }
    }
}
