//! Raw container statistics as reported by the Docker Engine API
//!
//! A non-streaming stats request returns one record holding the current
//! CPU accounting (`cpu_stats`), the accounting from the previous read
//! (`precpu_stats`) and memory accounting. Every field is optional on the
//! wire, so decoding is tolerant and missing values read as zero.

use crate::models::ContainerUsage;
use serde::Deserialize;
use std::collections::HashMap;

/// One statistics record for a container
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawContainerStats {
    pub cpu_stats: CpuStats,
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    pub total_usage: u64,
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub usage: Option<u64>,
    pub limit: Option<u64>,
    pub stats: Option<HashMap<String, u64>>,
}

impl RawContainerStats {
    /// Reduce the record to CPU and memory percentages
    pub fn usage(&self) -> ContainerUsage {
        let cpu_delta = self.cpu_stats.cpu_usage.total_usage as f64
            - self.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta = self.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
            - self.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;

        ContainerUsage {
            cpu_percent: cpu_percent(cpu_delta, system_delta, self.online_cpus()),
            memory_percent: self.memory_percent(),
        }
    }

    /// Online CPU count, falling back to the per-CPU breakdown length
    fn online_cpus(&self) -> u32 {
        match self.cpu_stats.online_cpus {
            Some(n) if n > 0 => n,
            _ => self
                .cpu_stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|v| v.len() as u32)
                .unwrap_or(0),
        }
    }

    fn memory_percent(&self) -> f64 {
        let limit = self.memory_stats.limit.unwrap_or(0);
        if limit == 0 {
            return 0.0;
        }

        let usage = self.memory_stats.usage.unwrap_or(0);
        let cache = self
            .memory_stats
            .stats
            .as_ref()
            .and_then(|s| {
                s.get("inactive_file")
                    .or_else(|| s.get("total_inactive_file"))
                    .or_else(|| s.get("cache"))
                    .copied()
            })
            .unwrap_or(0);

        usage.saturating_sub(cache) as f64 / limit as f64 * 100.0
    }
}

/// `(cpu_delta / system_delta) * online_cpus * 100`, or zero when either
/// delta is not positive
fn cpu_percent(cpu_delta: f64, system_delta: f64, online_cpus: u32) -> f64 {
    if cpu_delta > 0.0 && system_delta > 0.0 {
        (cpu_delta / system_delta) * online_cpus as f64 * 100.0
    } else {
        0.0
    }
}
