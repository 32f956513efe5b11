//! Child process monitor: detects session processes that exited on their own.
//!
//! Periodically asks the supervisor to reconcile its registry against the
//! containers the multiplexer still reports. Sessions whose container is
//! gone are marked stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::supervisor::SessionSupervisor;

/// Spawn the reconciliation loop.
///
/// The task polls every `interval` until `cancel` fires.
#[must_use]
pub fn spawn_child_monitor(
    supervisor: Arc<SessionSupervisor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("child process monitor shutting down");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }

            match supervisor.reconcile().await {
                Ok(stopped) if !stopped.is_empty() => {
                    info!(count = stopped.len(), "reconciled vanished session processes");
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "session reconciliation failed"),
            }
        }
    })
}
