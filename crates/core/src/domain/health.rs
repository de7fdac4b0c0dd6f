// Health read model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::lifecycle::SupervisorStatus;

/// Composite health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Outcome of a single engine health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub success: bool,
    pub at: DateTime<Utc>,
    pub latency: Duration,
    /// HTTP status or transport error text
    pub detail: Option<String>,
}

/// One line of the per-check breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
    pub data: BTreeMap<String, String>,
}

/// Metrics of the hosting process (not the engine)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostMetrics {
    pub cpu_usage_percent: f32,
    pub memory_rss_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub thread_count: usize,
    pub uptime_secs: u64,
    pub host_total_memory_bytes: u64,
    pub host_used_memory_bytes: u64,
    pub cpu_count: usize,
}

/// Static facts about the host, for operators
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub cpu_count: usize,
    pub process_id: u32,
    pub in_container: bool,
    pub version: String,
}

/// Assembled on demand; never cached beyond a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub supervisor: SupervisorStatus,
    pub last_probe: Option<ProbeRecord>,
    pub probe_fresh: bool,
    pub host: HostMetrics,
    pub checks: Vec<HealthCheck>,
    pub taken_at: DateTime<Utc>,
    /// Time spent assembling this snapshot
    pub duration: Duration,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
