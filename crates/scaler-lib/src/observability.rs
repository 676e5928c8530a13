//! Observability infrastructure for the scaler
//!
//! Provides:
//! - Prometheus metrics (refresh and scaling latency, actions, provider errors)
//! - Structured logging of scaling events with tracing

use crate::engine::{Decision, DecisionReason};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Histogram buckets for cycle latencies (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScalerMetricsInner> = OnceLock::new();

struct ScalerMetricsInner {
    refresh_latency_seconds: Histogram,
    scaling_cycle_latency_seconds: Histogram,
    scaling_actions_total: IntCounterVec,
    provider_errors_total: IntCounter,
    stats_unavailable_total: IntCounter,
    label_mutation_errors_total: IntCounter,
    loop_restarts_total: IntCounter,
    active_nodes: IntGauge,
    managed_services: IntGauge,
    staged_scalings: IntGauge,
}

impl ScalerMetricsInner {
    fn new() -> Self {
        Self {
            refresh_latency_seconds: register_histogram!(
                "swarm_scaler_refresh_latency_seconds",
                "Time spent refreshing the cluster snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register refresh_latency_seconds"),

            scaling_cycle_latency_seconds: register_histogram!(
                "swarm_scaler_scaling_cycle_latency_seconds",
                "Time spent evaluating and actuating all managed services",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scaling_cycle_latency_seconds"),

            scaling_actions_total: register_int_counter_vec!(
                "swarm_scaler_scaling_actions_total",
                "Scaling actions requested, by direction",
                &["direction"]
            )
            .expect("Failed to register scaling_actions_total"),

            provider_errors_total: register_int_counter!(
                "swarm_scaler_provider_errors_total",
                "Failed cluster state queries"
            )
            .expect("Failed to register provider_errors_total"),

            stats_unavailable_total: register_int_counter!(
                "swarm_scaler_stats_unavailable_total",
                "Container statistics that could not be sampled"
            )
            .expect("Failed to register stats_unavailable_total"),

            label_mutation_errors_total: register_int_counter!(
                "swarm_scaler_label_mutation_errors_total",
                "Node label mutations that failed"
            )
            .expect("Failed to register label_mutation_errors_total"),

            loop_restarts_total: register_int_counter!(
                "swarm_scaler_loop_restarts_total",
                "Reconciliation loop restarts after a fatal fault"
            )
            .expect("Failed to register loop_restarts_total"),

            active_nodes: register_int_gauge!(
                "swarm_scaler_active_nodes",
                "Active and ready nodes in the current snapshot"
            )
            .expect("Failed to register active_nodes"),

            managed_services: register_int_gauge!(
                "swarm_scaler_managed_services",
                "Services with a loaded scaling policy"
            )
            .expect("Failed to register managed_services"),

            staged_scalings: register_int_gauge!(
                "swarm_scaler_staged_scalings",
                "Scaling conditions waiting for their cooldown"
            )
            .expect("Failed to register staged_scalings"),
        }
    }
}

/// Scaler metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ScalerMetrics {
    _private: (),
}

impl Default for ScalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScalerMetricsInner {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new)
    }

    pub fn observe_refresh_latency(&self, elapsed: Duration) {
        self.inner().refresh_latency_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn observe_scaling_latency(&self, elapsed: Duration) {
        self.inner()
            .scaling_cycle_latency_seconds
            .observe(elapsed.as_secs_f64());
    }

    /// Count a non-empty scaling action
    pub fn inc_scaling_action(&self, decision: &Decision) {
        if decision.nodes().is_empty() {
            return;
        }
        if let Some(direction) = decision.direction() {
            self.inner()
                .scaling_actions_total
                .with_label_values(&[&direction.to_string()])
                .inc();
        }
    }

    pub fn inc_provider_errors(&self, count: u64) {
        self.inner().provider_errors_total.inc_by(count);
    }

    pub fn inc_stats_unavailable(&self) {
        self.inner().stats_unavailable_total.inc();
    }

    pub fn inc_label_mutation_errors(&self) {
        self.inner().label_mutation_errors_total.inc();
    }

    pub fn inc_loop_restarts(&self) {
        self.inner().loop_restarts_total.inc();
    }

    pub fn set_active_nodes(&self, count: usize) {
        self.inner().active_nodes.set(count as i64);
    }

    pub fn set_managed_services(&self, count: usize) {
        self.inner().managed_services.set(count as i64);
    }

    pub fn set_staged_scalings(&self, count: usize) {
        self.inner().staged_scalings.set(count as i64);
    }
}

/// Structured logger for scaler events
///
/// Every event carries an `event` field and the node the daemon runs on.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn log_startup(&self, version: &str, docker_url: &str, policy_source: &str) {
        info!(
            event = "scaler_started",
            node = %self.node_name,
            scaler_version = %version,
            docker_url = %docker_url,
            policy_source = %policy_source,
            "Swarm scaler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scaler_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Swarm scaler shutting down"
        );
    }

    /// Log a scaling action the engine decided on
    pub fn log_scaling_action(
        &self,
        service: &str,
        decision: &Decision,
        reason: DecisionReason,
        running: usize,
        healthy: usize,
    ) {
        info!(
            event = "scaling_action",
            node = %self.node_name,
            service = %service,
            action = %decision.label(),
            target_nodes = ?decision.nodes(),
            reason = %reason,
            running = running,
            healthy = healthy,
            "Scaling service"
        );
    }

    /// Log an evaluation that produced no action
    pub fn log_scaling_skipped(&self, service: &str, reason: DecisionReason, running: usize, healthy: usize) {
        debug!(
            event = "scaling_skipped",
            node = %self.node_name,
            service = %service,
            reason = %reason,
            running = running,
            healthy = healthy,
            "No scaling action"
        );
    }

    pub fn log_label_failure(&self, service: &str, target_node: &str, label: &str, error: &str) {
        warn!(
            event = "label_mutation_failed",
            node = %self.node_name,
            service = %service,
            target_node = %target_node,
            label = %label,
            error = %error,
            "Failed to update node label, will retry next cycle"
        );
    }

    pub fn log_loop_restart(&self, error: &str, backoff: Duration) {
        error!(
            event = "loop_restarted",
            node = %self.node_name,
            error = %error,
            backoff_secs = backoff.as_secs(),
            "Reconciliation loop failed, restarting"
        );
    }
}
