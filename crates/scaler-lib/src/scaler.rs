//! Per-service scaling: project, decide, then signal placement intent
//! through node labels.

use crate::engine::{Decision, DecisionEngine, DecisionReason, Direction, Evaluation};
use crate::models::Node;
use crate::observability::{ScalerMetrics, StructuredLogger};
use crate::policy::ServicePolicy;
use crate::projector::ServiceProjector;
use crate::provider::ClusterProvider;
use crate::sampler::UsageSampler;
use crate::snapshot::ClusterSnapshot;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Label value set on scale-out targets
pub const LABEL_ENABLED: &str = "1";

/// Last evaluation of one managed service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: String,
    pub decision: Decision,
    pub reason: DecisionReason,
    pub running: usize,
    pub healthy: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_out: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_in: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Latest [`ServiceStatus`] per service name
#[derive(Debug, Clone, Default)]
pub struct DecisionLog {
    entries: Arc<DashMap<String, ServiceStatus>>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: ServiceStatus) {
        self.entries.insert(status.service.clone(), status);
    }

    pub fn get(&self, service: &str) -> Option<ServiceStatus> {
        self.entries.get(service).map(|e| e.value().clone())
    }

    /// All statuses, sorted by service name
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        let mut statuses: Vec<ServiceStatus> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        statuses.sort_by(|a, b| a.service.cmp(&b.service));
        statuses
    }

    /// Drop services that no longer have a policy
    pub fn retain_services(&self, names: &[String]) {
        self.entries.retain(|name, _| names.contains(name));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs one scaling cycle for a single service
pub struct ServiceScaler {
    provider: Arc<dyn ClusterProvider>,
    projector: ServiceProjector,
    engine: Arc<DecisionEngine>,
    decisions: DecisionLog,
    logger: StructuredLogger,
    metrics: ScalerMetrics,
}

impl ServiceScaler {
    pub fn new(
        provider: Arc<dyn ClusterProvider>,
        engine: Arc<DecisionEngine>,
        decisions: DecisionLog,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            projector: ServiceProjector::new(UsageSampler::new(provider.clone())),
            provider,
            engine,
            decisions,
            logger,
            metrics: ScalerMetrics::new(),
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Evaluate the policy's service and apply the resulting labels.
    ///
    /// Label failures are logged and swallowed; the next cycle re-evaluates
    /// from fresh state.
    pub async fn scale(
        &self,
        policy: &ServicePolicy,
        snapshot: &ClusterSnapshot,
        active_nodes: &[Node],
    ) -> Evaluation {
        let projection = self.projector.project(&policy.name, snapshot).await;
        let evaluation = self.engine.evaluate(policy, &projection, active_nodes);

        match evaluation.decision {
            Decision::None => self.logger.log_scaling_skipped(
                &policy.name,
                evaluation.reason,
                evaluation.running,
                evaluation.healthy,
            ),
            _ => {
                self.logger.log_scaling_action(
                    &policy.name,
                    &evaluation.decision,
                    evaluation.reason,
                    evaluation.running,
                    evaluation.healthy,
                );
                self.metrics.inc_scaling_action(&evaluation.decision);
                self.apply(policy, &evaluation.decision).await;
            }
        }

        let staging = self.engine.staging();
        let service_id = projection.service.as_ref().map(|s| s.id.as_str());
        self.decisions.record(ServiceStatus {
            service: policy.name.clone(),
            decision: evaluation.decision.clone(),
            reason: evaluation.reason,
            running: evaluation.running,
            healthy: evaluation.healthy,
            staged_out: service_id.and_then(|id| staging.staged_at(id, Direction::Out)),
            staged_in: service_id.and_then(|id| staging.staged_at(id, Direction::In)),
            updated_at: Utc::now(),
        });

        evaluation
    }

    async fn apply(&self, policy: &ServicePolicy, decision: &Decision) {
        for node_id in decision.nodes() {
            let result = match decision {
                Decision::ScaleOut(_) => {
                    self.provider
                        .add_node_label(node_id, &policy.node_label, LABEL_ENABLED)
                        .await
                }
                Decision::ScaleIn(_) => {
                    self.provider
                        .remove_node_label(node_id, &policy.node_label)
                        .await
                }
                Decision::None => Ok(()),
            };

            if let Err(e) = result {
                self.metrics.inc_label_mutation_errors();
                self.logger
                    .log_label_failure(&policy.name, node_id, &policy.node_label, &e.to_string());
            }
        }
    }
}
