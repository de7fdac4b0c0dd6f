//! HTTP Request/Response Types
//!
//! Public wire format is camelCase.

use linguard_core::application::CacheStats;
use linguard_core::domain::{
    ExitInfo, HealthCheck, HealthSnapshot, HealthStatus, HostMetrics, OwnershipKind,
    SupervisorState, SupervisorStatus, SystemInfo, TranslationResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// POST /translate
///
/// Missing fields default to empty so validation reports which one is wrong.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateBody {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_lang: Option<String>,
    pub latency_ms: u64,
    pub cached: bool,
}

impl TranslateResponse {
    pub fn new(result: TranslationResult, cached: bool) -> Self {
        Self {
            translated_text: result.translated_text,
            detected_lang: result.detected_lang,
            latency_ms: result.latency.as_millis() as u64,
            cached,
        }
    }
}

/// GET /languages
#[derive(Debug, Clone, Serialize)]
pub struct LanguagesResponse {
    pub languages: BTreeMap<String, String>,
}

/// GET /health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub total_duration_ms: f64,
    pub checks: Vec<HealthCheck>,
    pub supervisor: SupervisorView,
}

impl From<HealthSnapshot> for HealthResponse {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            status: snapshot.status,
            total_duration_ms: snapshot.duration.as_secs_f64() * 1000.0,
            checks: snapshot.checks,
            supervisor: snapshot.supervisor.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorView {
    pub state: SupervisorState,
    pub pid: Option<u32>,
    pub ownership: Option<OwnershipKind>,
    pub restart_attempts: u32,
    pub last_transition: String,
    pub ready_since: Option<String>,
    pub last_exit: Option<ExitInfo>,
    pub last_error: Option<String>,
}

impl From<SupervisorStatus> for SupervisorView {
    fn from(status: SupervisorStatus) -> Self {
        Self {
            state: status.state,
            pid: status.pid,
            ownership: status.ownership,
            restart_attempts: status.restart_attempts,
            last_transition: status.last_transition.to_rfc3339(),
            ready_since: status.ready_since.map(|at| at.to_rfc3339()),
            last_exit: status.last_exit,
            last_error: status.last_error,
        }
    }
}

/// GET /health/metrics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub cpu_usage_percent: f32,
    pub memory_rss_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub thread_count: usize,
    pub uptime_secs: u64,
    pub host_total_memory_bytes: u64,
    pub host_used_memory_bytes: u64,
    pub cpu_count: usize,
}

impl From<HostMetrics> for MetricsResponse {
    fn from(m: HostMetrics) -> Self {
        Self {
            cpu_usage_percent: m.cpu_usage_percent,
            memory_rss_bytes: m.memory_rss_bytes,
            virtual_memory_bytes: m.virtual_memory_bytes,
            thread_count: m.thread_count,
            uptime_secs: m.uptime_secs,
            host_total_memory_bytes: m.host_total_memory_bytes,
            host_used_memory_bytes: m.host_used_memory_bytes,
            cpu_count: m.cpu_count,
        }
    }
}

/// GET /health/info
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub cpu_count: usize,
    pub process_id: u32,
    pub in_container: bool,
    pub version: String,
}

impl From<SystemInfo> for InfoResponse {
    fn from(info: SystemInfo) -> Self {
        Self {
            host_name: info.host_name,
            os_name: info.os_name,
            os_version: info.os_version,
            kernel_version: info.kernel_version,
            cpu_count: info.cpu_count,
            process_id: info.process_id,
            in_container: info.in_container,
            version: info.version,
        }
    }
}

/// GET /health/version
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: String,
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub cpu_count: usize,
}

impl From<SystemInfo> for VersionResponse {
    fn from(info: SystemInfo) -> Self {
        Self {
            version: info.version,
            host_name: info.host_name,
            os_name: info.os_name,
            cpu_count: info.cpu_count,
        }
    }
}

/// GET /stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub uptime_secs: u64,
    pub version: String,
    pub engine_state: SupervisorState,
    pub cache: CacheView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheView {
    pub hits: u64,
    pub misses: u64,
    pub joined: u64,
    pub computations: u64,
    pub evictions: u64,
    pub entries: usize,
    pub in_flight: usize,
}

impl From<CacheStats> for CacheView {
    fn from(s: CacheStats) -> Self {
        Self {
            hits: s.hits,
            misses: s.misses,
            joined: s.joined,
            computations: s.computations,
            evictions: s.evictions,
            entries: s.entries,
            in_flight: s.in_flight,
        }
    }
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub details: Option<String>,
    pub status_code: u16,
    pub timestamp: String,
    pub path: String,
    pub method: String,
    pub trace_id: String,
}
