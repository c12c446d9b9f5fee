//! Background tasks for the IVR server.
//!
//! Includes:
//! - Evicting sessions whose call never reported a terminal status.

use ivr_session::Orchestrator;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the idle session eviction task.
///
/// This task runs indefinitely, periodically dropping sessions that have seen
/// no event for `idle_timeout_seconds`. A value of 0 disables it.
pub async fn start_eviction_task(orchestrator: Arc<Orchestrator>, idle_timeout_seconds: u64) {
    if idle_timeout_seconds == 0 {
        tracing::warn!("session eviction disabled (idle_timeout_seconds=0)");
        return;
    }

    // Run check every 60 seconds or threshold/2, whichever is smaller (but min 1s)
    let interval_seconds = (idle_timeout_seconds / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);
    let max_idle = Duration::from_secs(idle_timeout_seconds);

    tracing::info!(
        idle_timeout_seconds,
        interval_seconds,
        "starting session eviction task"
    );

    loop {
        sleep(interval).await;

        let evicted = orchestrator.evict_idle(max_idle);
        if !evicted.is_empty() {
            tracing::info!(
                count = evicted.len(),
                remaining = orchestrator.store().len(),
                "evicted idle sessions"
            );
        }
    }
}
