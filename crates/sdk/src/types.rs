//! SDK Request/Response Types
//!
//! Mirrors the camelCase types of the HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// POST /translate body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
    #[serde(default)]
    pub detected_lang: Option<String>,
    pub latency_ms: u64,
    pub cached: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguagesResponse {
    pub languages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Healthy, Degraded or Unhealthy
    pub status: String,
    pub total_duration_ms: f64,
    pub checks: Vec<HealthCheck>,
    pub supervisor: EngineStatus,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "Healthy"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub description: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Supervisor status, also returned by POST /engine/start
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub state: String,
    pub pid: Option<u32>,
    /// `{"kind": "attached" | "managed_service" | "subprocess", ...}`
    pub ownership: Option<serde_json::Value>,
    pub restart_attempts: u32,
    pub last_transition: String,
    pub ready_since: Option<String>,
    pub last_exit: Option<ExitInfo>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
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

#[derive(Debug, Clone, Deserialize)]
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

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: String,
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub cpu_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub uptime_secs: u64,
    pub version: String,
    pub engine_state: String,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub joined: u64,
    pub computations: u64,
    pub evictions: u64,
    pub entries: usize,
    pub in_flight: usize,
}

/// Error body shared by every endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    pub message: String,
}
