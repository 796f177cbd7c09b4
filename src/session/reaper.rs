//! Background idle-timeout loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::manager::SessionManager;
use crate::scheduler::{ShutdownToken, Ticker};

/// Sweep idle sessions every `cleanup_interval_secs` until `shutdown` fires.
///
/// Shutdown interrupts the wait between sweeps; a sweep already in progress
/// finishes first. Pending failed writes are retried before returning.
pub async fn run_idle_reaper(manager: Arc<SessionManager>, shutdown: ShutdownToken) {
    let period = Duration::from_secs(manager.config().cleanup_interval_secs);
    let mut ticker = Ticker::new(period, shutdown);
    info!(interval_secs = period.as_secs(), "session cleanup task started");

    while ticker.tick().await {
        let expired = manager.sweep_idle().await;
        debug!(expired = expired.len(), "idle sweep complete");
    }

    manager.flush().await;
    info!("session cleanup task stopped");
}

pub fn spawn_idle_reaper(manager: Arc<SessionManager>, shutdown: ShutdownToken) -> JoinHandle<()> {
    tokio::spawn(run_idle_reaper(manager, shutdown))
}
