//! Scaling decision engine
//!
//! Evaluates one service per call against its policy, in strict order:
//!
//! 1. Fewer instances running than `min_replicas`: scale out immediately.
//! 2. Instances are split into healthy and sick by the scale-out thresholds.
//! 3. Fewer healthy instances than `min_replicas`: scale out once the
//!    scale-out cooldown has elapsed.
//! 4. Exactly `min_replicas` running: stable.
//! 5. Otherwise: scale in the surplus once the scale-in cooldown has elapsed.

mod staging;

pub use staging::{Clock, Direction, StagedScaling, StagingArea, SystemClock};

use crate::models::{Node, ServiceProjection};
use crate::policy::ServicePolicy;
use crate::selector::{candidates_for_scale_out, least_loaded_for_scale_in};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "nodes", rename_all = "snake_case")]
pub enum Decision {
    None,
    ScaleOut(Vec<String>),
    ScaleIn(Vec<String>),
}

impl Decision {
    pub fn nodes(&self) -> &[String] {
        match self {
            Decision::None => &[],
            Decision::ScaleOut(nodes) | Decision::ScaleIn(nodes) => nodes,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Decision::None => None,
            Decision::ScaleOut(_) => Some(Direction::Out),
            Decision::ScaleIn(_) => Some(Direction::In),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::None => "none",
            Decision::ScaleOut(_) => "scale_out",
            Decision::ScaleIn(_) => "scale_in",
        }
    }
}

/// Which branch produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ServiceNotFound,
    BelowMinimum,
    AtMaxReplicas,
    ScaleOutStaged,
    Unhealthy,
    NoRoomToScaleOut,
    Stable,
    ScaleInStaged,
    ExcessCapacity,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionReason::ServiceNotFound => "service not found",
            DecisionReason::BelowMinimum => "below minimum replicas",
            DecisionReason::AtMaxReplicas => "unhealthy at maximum replicas",
            DecisionReason::ScaleOutStaged => "scale-out cooling down",
            DecisionReason::Unhealthy => "too few healthy instances",
            DecisionReason::NoRoomToScaleOut => "no room to scale out",
            DecisionReason::Stable => "stable",
            DecisionReason::ScaleInStaged => "scale-in cooling down",
            DecisionReason::ExcessCapacity => "excess healthy instances",
        };
        f.write_str(s)
    }
}

/// A decision together with the counts it was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub reason: DecisionReason,
    pub running: usize,
    pub healthy: usize,
    /// Nodes the engine wanted before candidates ran out
    pub requested: usize,
}

impl Evaluation {
    fn idle(reason: DecisionReason, running: usize, healthy: usize) -> Self {
        Self {
            decision: Decision::None,
            reason,
            running,
            healthy,
            requested: 0,
        }
    }
}

/// Per-service hysteresis state machine
pub struct DecisionEngine {
    staging: StagingArea,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl DecisionEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            staging: StagingArea::new(clock),
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Evaluate one service.
    ///
    /// `active_nodes` is the ordered list of nodes eligible to receive new
    /// instances.
    pub fn evaluate(
        &self,
        policy: &ServicePolicy,
        projection: &ServiceProjection,
        active_nodes: &[Node],
    ) -> Evaluation {
        let Some(service) = projection.service.as_ref() else {
            return Evaluation::idle(DecisionReason::ServiceNotFound, 0, 0);
        };
        let service_id = service.id.as_str();
        let running = projection.running_count();
        let healthy = healthy_count(policy, projection);

        if running < policy.min_replicas {
            let needed = policy.min_replicas - running;
            let nodes = candidates_for_scale_out(projection, active_nodes, needed);
            if nodes.len() < needed {
                warn!(
                    service = %policy.name,
                    needed,
                    available = nodes.len(),
                    "Not enough candidate nodes to reach minimum replicas"
                );
            }
            self.staging.clear_service(service_id);
            return Evaluation {
                decision: Decision::ScaleOut(nodes),
                reason: DecisionReason::BelowMinimum,
                running,
                healthy,
                requested: needed,
            };
        }

        if healthy < policy.min_replicas {
            if running >= policy.max_replicas {
                warn!(
                    service = %policy.name,
                    running,
                    healthy,
                    max_replicas = policy.max_replicas,
                    "Service is unhealthy but already at maximum replicas"
                );
                return Evaluation::idle(DecisionReason::AtMaxReplicas, running, healthy);
            }

            self.staging.consume(service_id, Direction::In);
            if !self.ready(service_id, Direction::Out, policy.scale_out.cooldown) {
                return Evaluation::idle(DecisionReason::ScaleOutStaged, running, healthy);
            }

            let needed = policy.min_replicas - healthy;
            let room = policy.max_replicas - running;
            let count = if needed > room {
                warn!(
                    service = %policy.name,
                    needed,
                    max_replicas = policy.max_replicas,
                    "Scale-out capped at maximum replicas"
                );
                room
            } else {
                needed
            };

            if count == 0 {
                self.staging.consume(service_id, Direction::Out);
                return Evaluation::idle(DecisionReason::NoRoomToScaleOut, running, healthy);
            }

            let nodes = candidates_for_scale_out(projection, active_nodes, count);
            if nodes.len() < count {
                warn!(
                    service = %policy.name,
                    needed = count,
                    available = nodes.len(),
                    "Not enough candidate nodes for scale-out"
                );
            }
            self.staging.clear_service(service_id);
            return Evaluation {
                decision: Decision::ScaleOut(nodes),
                reason: DecisionReason::Unhealthy,
                running,
                healthy,
                requested: count,
            };
        }

        let excess = healthy - policy.min_replicas;
        if running == policy.min_replicas || excess == 0 {
            self.staging.clear_service(service_id);
            return Evaluation::idle(DecisionReason::Stable, running, healthy);
        }

        self.staging.consume(service_id, Direction::Out);
        if !self.ready(service_id, Direction::In, policy.scale_in.cooldown) {
            return Evaluation::idle(DecisionReason::ScaleInStaged, running, healthy);
        }

        let nodes = least_loaded_for_scale_in(projection, excess);
        self.staging.clear_service(service_id);
        Evaluation {
            decision: Decision::ScaleIn(nodes),
            reason: DecisionReason::ExcessCapacity,
            running,
            healthy,
            requested: excess,
        }
    }

    fn ready(&self, service_id: &str, direction: Direction, cooldown: Duration) -> bool {
        if cooldown.is_zero() {
            return true;
        }
        self.staging.cooldown_elapsed(service_id, direction, cooldown)
    }
}

/// Instances at or below both scale-out thresholds
fn healthy_count(policy: &ServicePolicy, projection: &ServiceProjection) -> usize {
    projection
        .instances
        .iter()
        .filter(|i| {
            i.usage.cpu_percent <= policy.scale_out.cpu_threshold
                && i.usage.memory_percent <= policy.scale_out.memory_threshold
        })
        .count()
}
