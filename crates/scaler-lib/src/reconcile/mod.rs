//! Reconciliation
//!
//! Three periodic activities run concurrently and independently: reloading
//! policies, refreshing the cluster snapshot, and scaling every managed
//! service. Each activity sleeps a full interval after its work finishes,
//! so a slow cycle delays the next one instead of overlapping it.
//!
//! A [`Supervisor`] runs the loop and, after a fatal fault, starts a fresh
//! one with empty state once the restart backoff has passed.

mod r#loop;
mod supervisor;

pub use r#loop::ReconciliationLoop;
pub use supervisor::{Supervisor, SupervisorBuilder};

use crate::policy::PolicyProvider;
use crate::provider::ClusterProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Timing of the reconciliation activities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Delay between policy reloads (default: 5 seconds)
    pub config_interval: Duration,
    /// Delay between snapshot refreshes (default: 5 seconds)
    pub refresh_interval: Duration,
    /// Delay between scaling cycles (default: 5 seconds)
    pub scale_interval: Duration,
    /// Wait before restarting after a fatal fault (default: 5 seconds)
    pub restart_backoff: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            config_interval: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(5),
            scale_interval: Duration::from_secs(5),
            restart_backoff: Duration::from_secs(5),
        }
    }
}

/// Run reconciliation until `shutdown` fires, restarting after fatal faults
pub async fn run_reconciliation_forever(
    cluster: Arc<dyn ClusterProvider>,
    policies: Arc<dyn PolicyProvider>,
    settings: ReconcilerSettings,
    shutdown: broadcast::Receiver<()>,
) {
    Supervisor::new(cluster, policies, settings)
        .run(shutdown)
        .await
}
