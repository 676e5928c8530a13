//! Staged scaling (cooldown hysteresis)
//!
//! A staged entry records when a scaling-worthy condition was first seen
//! for a service in one direction. The decision engine only acts once the
//! entry is older than the policy's cooldown.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Scaling direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Out,
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => write!(f, "out"),
            Direction::In => write!(f, "in"),
        }
    }
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A staged entry, as reported for status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedScaling {
    pub service_id: String,
    pub direction: Direction,
    pub staged_at: DateTime<Utc>,
}

/// Staged scaling entries keyed by service id and direction
pub struct StagingArea {
    entries: DashMap<(String, Direction), DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl StagingArea {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Whether a staged entry exists and is at least `cooldown` old.
    ///
    /// When no entry exists one is staged now and `false` is returned.
    pub fn cooldown_elapsed(&self, service_id: &str, direction: Direction, cooldown: Duration) -> bool {
        let now = self.clock.now();
        let key = (service_id.to_string(), direction);

        let mut staged_at = self.entries.entry(key).or_insert(now);
        if *staged_at == now {
            return cooldown.is_zero();
        }

        match (now - *staged_at).to_std() {
            Ok(elapsed) => elapsed >= cooldown,
            // Wall clock stepped backwards
            Err(_) => {
                *staged_at = now;
                cooldown.is_zero()
            }
        }
    }

    /// Remove the entry for one direction
    pub fn consume(&self, service_id: &str, direction: Direction) {
        self.entries.remove(&(service_id.to_string(), direction));
    }

    /// Remove both entries for a service
    pub fn clear_service(&self, service_id: &str) {
        self.consume(service_id, Direction::Out);
        self.consume(service_id, Direction::In);
    }

    /// Drop entries for services not in `service_ids`
    pub fn retain_services(&self, service_ids: &[String]) {
        self.entries.retain(|(id, _), _| service_ids.contains(id));
    }

    pub fn staged_at(&self, service_id: &str, direction: Direction) -> Option<DateTime<Utc>> {
        self.entries
            .get(&(service_id.to_string(), direction))
            .map(|e| *e.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all staged entries
    pub fn entries(&self) -> Vec<StagedScaling> {
        self.entries
            .iter()
            .map(|e| StagedScaling {
                service_id: e.key().0.clone(),
                direction: e.key().1,
                staged_at: *e.value(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;

    fn area() -> (StagingArea, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (StagingArea::new(clock.clone()), clock)
    }

    #[test]
    fn test_first_observation_stages_without_acting() {
        let (area, _clock) = area();

        assert!(!area.cooldown_elapsed("s1", Direction::Out, Duration::from_secs(60)));
        assert!(area.staged_at("s1", Direction::Out).is_some());
        assert!(area.staged_at("s1", Direction::In).is_none());
    }

    #[test]
    fn test_elapses_after_cooldown() {
        let (area, clock) = area();
        let cooldown = Duration::from_secs(60);

        area.cooldown_elapsed("s1", Direction::In, cooldown);
        clock.advance(Duration::from_secs(59));
        assert!(!area.cooldown_elapsed("s1", Direction::In, cooldown));

        clock.advance(Duration::from_secs(1));
        assert!(area.cooldown_elapsed("s1", Direction::In, cooldown));
    }

    #[test]
    fn test_directions_are_independent() {
        let (area, clock) = area();
        let cooldown = Duration::from_secs(10);

        area.cooldown_elapsed("s1", Direction::Out, cooldown);
        clock.advance(Duration::from_secs(10));

        assert!(!area.cooldown_elapsed("s1", Direction::In, cooldown));
        assert!(area.cooldown_elapsed("s1", Direction::Out, cooldown));
    }

    #[test]
    fn test_clear_service_removes_both_directions() {
        let (area, _clock) = area();
        area.cooldown_elapsed("s1", Direction::Out, Duration::from_secs(5));
        area.cooldown_elapsed("s1", Direction::In, Duration::from_secs(5));
        area.cooldown_elapsed("s2", Direction::In, Duration::from_secs(5));

        area.clear_service("s1");

        assert_eq!(area.len(), 1);
        assert_eq!(area.entries()[0].service_id, "s2");
    }

    #[test]
    fn test_consumed_entry_restages() {
        let (area, clock) = area();
        let cooldown = Duration::from_secs(5);

        area.cooldown_elapsed("s1", Direction::Out, cooldown);
        clock.advance(Duration::from_secs(5));
        area.consume("s1", Direction::Out);

        assert!(!area.cooldown_elapsed("s1", Direction::Out, cooldown));
    }

    #[test]
    fn test_retain_services_drops_unlisted() {
        let (area, _clock) = area();
        area.cooldown_elapsed("s1", Direction::Out, Duration::from_secs(5));
        area.cooldown_elapsed("s2", Direction::Out, Duration::from_secs(5));
        area.cooldown_elapsed("s2", Direction::In, Duration::from_secs(5));

        area.retain_services(&["s2".to_string()]);

        assert_eq!(area.len(), 2);
        assert!(area.staged_at("s1", Direction::Out).is_none());
    }

    #[test]
    fn test_backward_clock_step_restages() {
        let (area, clock) = area();
        let cooldown = Duration::from_secs(60);

        area.cooldown_elapsed("s1", Direction::Out, cooldown);
        clock.rewind(Duration::from_secs(600));

        assert!(!area.cooldown_elapsed("s1", Direction::Out, cooldown));
        assert_eq!(area.staged_at("s1", Direction::Out), Some(clock.now()));

        clock.advance(cooldown);
        assert!(area.cooldown_elapsed("s1", Direction::Out, cooldown));
    }
}
