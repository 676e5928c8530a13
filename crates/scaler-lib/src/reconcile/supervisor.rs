//! Restarts the reconciliation loop after fatal faults

use super::{ReconcilerSettings, ReconciliationLoop};
use crate::engine::{Clock, DecisionEngine, SystemClock};
use crate::health::{components, HealthRegistry};
use crate::observability::{ScalerMetrics, StructuredLogger};
use crate::policy::PolicyProvider;
use crate::provider::ClusterProvider;
use crate::scaler::DecisionLog;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Keeps a [`ReconciliationLoop`] running until shutdown
pub struct Supervisor {
    cluster: Arc<dyn ClusterProvider>,
    policies: Arc<dyn PolicyProvider>,
    settings: ReconcilerSettings,
    health: HealthRegistry,
    decisions: DecisionLog,
    logger: StructuredLogger,
    clock: Arc<dyn Clock>,
    metrics: ScalerMetrics,
}

impl Supervisor {
    pub fn new(
        cluster: Arc<dyn ClusterProvider>,
        policies: Arc<dyn PolicyProvider>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            cluster,
            policies,
            settings,
            health: HealthRegistry::new(),
            decisions: DecisionLog::new(),
            logger: StructuredLogger::new("unknown"),
            clock: Arc::new(SystemClock),
            metrics: ScalerMetrics::new(),
        }
    }

    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Build a loop with fresh snapshot, staging and decision state
    fn fresh_loop(&self) -> ReconciliationLoop {
        self.decisions.clear();
        ReconciliationLoop::new(
            self.cluster.clone(),
            self.policies.clone(),
            self.settings.clone(),
            Arc::new(DecisionEngine::new(self.clock.clone())),
            self.decisions.clone(),
            self.health.clone(),
            self.logger.clone(),
        )
    }

    /// Run loops until `shutdown` fires.
    ///
    /// Shutdown is observed between cycles; scaling already in flight
    /// completes first.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let reconciler = self.fresh_loop();
            let error = match reconciler.run(shutdown.resubscribe()).await {
                Ok(()) => return,
                Err(e) => e,
            };

            let backoff = self.settings.restart_backoff;
            self.logger.log_loop_restart(&error.to_string(), backoff);
            self.metrics.inc_loop_restarts();
            self.health.set_ready(false).await;
            self.health
                .set_unhealthy(components::SCALER, error.to_string())
                .await;

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.recv() => {
                    info!("Shutdown requested during restart backoff");
                    return;
                }
            }
        }
    }
}

/// Builder for a [`Supervisor`]
pub struct SupervisorBuilder {
    cluster: Option<Arc<dyn ClusterProvider>>,
    policies: Option<Arc<dyn PolicyProvider>>,
    settings: ReconcilerSettings,
    health: Option<HealthRegistry>,
    decisions: Option<DecisionLog>,
    logger: Option<StructuredLogger>,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self {
            cluster: None,
            policies: None,
            settings: ReconcilerSettings::default(),
            health: None,
            decisions: None,
            logger: None,
        }
    }

    pub fn cluster(mut self, cluster: Arc<dyn ClusterProvider>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn policies(mut self, policies: Arc<dyn PolicyProvider>) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn settings(mut self, settings: ReconcilerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share a health registry with the HTTP surface
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Share a decision log with the HTTP surface
    pub fn decision_log(mut self, decisions: DecisionLog) -> Self {
        self.decisions = Some(decisions);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<Supervisor> {
        let cluster = self
            .cluster
            .ok_or_else(|| anyhow::anyhow!("Cluster provider is required"))?;
        let policies = self
            .policies
            .ok_or_else(|| anyhow::anyhow!("Policy provider is required"))?;

        let mut supervisor = Supervisor::new(cluster, policies, self.settings);
        if let Some(health) = self.health {
            supervisor.health = health;
        }
        if let Some(decisions) = self.decisions {
            supervisor.decisions = decisions;
        }
        if let Some(logger) = self.logger {
            supervisor.logger = logger;
        }
        Ok(supervisor)
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
