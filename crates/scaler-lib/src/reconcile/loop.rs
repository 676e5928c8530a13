//! The reconciliation loop

use super::ReconcilerSettings;
use crate::engine::DecisionEngine;
use crate::error::ReconcileError;
use crate::health::{components, HealthRegistry};
use crate::observability::{ScalerMetrics, StructuredLogger};
use crate::policy::{PolicyProvider, ServicePolicy};
use crate::provider::ClusterProvider;
use crate::scaler::{DecisionLog, ServiceScaler};
use crate::snapshot::{RefreshReport, SnapshotStore};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One incarnation of the reconciliation loop.
///
/// All state (snapshot, loaded policies, staged scalings) lives and dies
/// with the loop.
pub struct ReconciliationLoop {
    cluster: Arc<dyn ClusterProvider>,
    policies: Arc<dyn PolicyProvider>,
    settings: ReconcilerSettings,
    store: SnapshotStore,
    loaded: ArcSwap<Vec<ServicePolicy>>,
    scaler: Arc<ServiceScaler>,
    decisions: DecisionLog,
    health: HealthRegistry,
    metrics: ScalerMetrics,
}

impl ReconciliationLoop {
    pub fn new(
        cluster: Arc<dyn ClusterProvider>,
        policies: Arc<dyn PolicyProvider>,
        settings: ReconcilerSettings,
        engine: Arc<DecisionEngine>,
        decisions: DecisionLog,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let scaler = ServiceScaler::new(cluster.clone(), engine, decisions.clone(), logger);
        Self {
            cluster,
            policies,
            settings,
            store: SnapshotStore::new(),
            loaded: ArcSwap::from_pointee(Vec::new()),
            scaler: Arc::new(scaler),
            decisions,
            health,
            metrics: ScalerMetrics::new(),
        }
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Policies currently in effect
    pub fn loaded_policies(&self) -> Arc<Vec<ServicePolicy>> {
        self.loaded.load_full()
    }

    /// Reload policies, keeping the previous list when loading fails
    pub async fn reload_policies(&self) {
        match self.policies.load().await {
            Ok(policies) => {
                if *self.loaded.load_full() != policies {
                    info!(count = policies.len(), "Scaling policies loaded");
                }
                let names: Vec<String> = policies.iter().map(|p| p.name.clone()).collect();
                self.decisions.retain_services(&names);
                self.evict_unmanaged_staging(&names);
                self.metrics.set_managed_services(policies.len());
                self.loaded.store(Arc::new(policies));
                self.health.set_healthy(components::POLICIES).await;
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Failed to reload policies, keeping previous list");
                self.health
                    .set_degraded(components::POLICIES, format!("{:#}", e))
                    .await;
            }
        }
    }

    /// Drop staged scalings of services no policy manages any more
    fn evict_unmanaged_staging(&self, policy_names: &[String]) {
        let snapshot = self.store.current();
        let managed: Vec<String> = policy_names
            .iter()
            .filter_map(|name| snapshot.service_by_name(name))
            .map(|service| service.id.clone())
            .collect();

        let staging = self.scaler.engine().staging();
        let before = staging.len();
        staging.retain_services(&managed);
        if staging.len() < before {
            debug!(evicted = before - staging.len(), "Dropped staged scalings of unmanaged services");
        }
    }

    /// Refresh the cluster snapshot and report health accordingly
    pub async fn refresh_snapshot(&self) -> RefreshReport {
        let start = Instant::now();
        let report = self.store.refresh(self.cluster.as_ref()).await;
        self.metrics.observe_refresh_latency(start.elapsed());

        let failures = report.failure_count();
        if failures > 0 {
            self.metrics.inc_provider_errors(failures as u64);
        }

        if report.is_total_failure() {
            self.health
                .set_degraded(components::SNAPSHOT, "refresh failed, using previous snapshot")
                .await;
            return report;
        }

        if report.is_complete() {
            self.health.set_healthy(components::SNAPSHOT).await;
        } else {
            self.health
                .set_degraded(
                    components::SNAPSHOT,
                    format!("{} of 3 cluster queries failed", failures),
                )
                .await;
        }
        self.metrics.set_active_nodes(self.store.current().node_count());
        self.health.set_ready(true).await;
        report
    }

    /// Evaluate every loaded policy once.
    ///
    /// Services are scaled concurrently and all of them finish before this
    /// returns. A panic while scaling any service is a fatal fault.
    pub async fn scale_all(&self) -> Result<usize, ReconcileError> {
        let snapshot = self.store.current();
        if snapshot.refreshed_at().is_none() {
            debug!("No cluster snapshot yet, skipping scaling cycle");
            return Ok(0);
        }

        let start = Instant::now();
        let policies = self.loaded.load_full();
        let active_nodes = match self.cluster.list_active_ready_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "Failed to list active nodes, using snapshot nodes");
                self.metrics.inc_provider_errors(1);
                snapshot.active_nodes()
            }
        };
        let active_nodes = Arc::new(active_nodes);

        let mut services = JoinSet::new();
        for policy in policies.iter().cloned() {
            let scaler = self.scaler.clone();
            let snapshot = snapshot.clone();
            let active_nodes = active_nodes.clone();
            services.spawn(async move {
                scaler.scale(&policy, &snapshot, &active_nodes).await;
            });
        }

        let mut fault = None;
        while let Some(joined) = services.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    fault.get_or_insert_with(|| format!("service scaling task panicked: {}", e));
                }
            }
        }

        self.metrics
            .set_staged_scalings(self.scaler.engine().staging().len());
        self.metrics.observe_scaling_latency(start.elapsed());

        match fault {
            Some(message) => Err(ReconcileError::Fatal(message)),
            None => {
                self.health.set_healthy(components::SCALER).await;
                Ok(policies.len())
            }
        }
    }

    /// Run all three activities until shutdown or a fatal fault
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), ReconcileError> {
        info!(
            config_interval_secs = self.settings.config_interval.as_secs(),
            refresh_interval_secs = self.settings.refresh_interval.as_secs(),
            scale_interval_secs = self.settings.scale_interval.as_secs(),
            "Starting reconciliation loop"
        );

        let this = Arc::new(self);
        let mut activities = JoinSet::new();
        activities.spawn(this.clone().policy_activity(shutdown.resubscribe()));
        activities.spawn(this.clone().refresh_activity(shutdown.resubscribe()));
        activities.spawn(this.scaling_activity(shutdown));

        while let Some(joined) = activities.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(ReconcileError::Fatal(format!("reconciliation task failed: {}", e)))
            });
            if let Err(e) = outcome {
                activities.shutdown().await;
                return Err(e);
            }
        }

        info!("Reconciliation loop stopped");
        Ok(())
    }

    async fn policy_activity(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ReconcileError> {
        loop {
            self.reload_policies().await;
            if !pause(self.settings.config_interval, &mut shutdown).await {
                return Ok(());
            }
        }
    }

    async fn refresh_activity(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ReconcileError> {
        loop {
            self.refresh_snapshot().await;
            if !pause(self.settings.refresh_interval, &mut shutdown).await {
                return Ok(());
            }
        }
    }

    async fn scaling_activity(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ReconcileError> {
        loop {
            self.scale_all().await?;
            if !pause(self.settings.scale_interval, &mut shutdown).await {
                return Ok(());
            }
        }
    }
}

/// Sleep for `interval`, returning `false` if shutdown was requested first
async fn pause(interval: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => true,
        _ = shutdown.recv() => false,
    }
}
