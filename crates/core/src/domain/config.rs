// Engine & Cache Configuration (immutable after load)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

/// How to reach, start and supervise the translation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the engine's HTTP surface
    pub base_url: String,
    pub health_path: String,
    pub translate_path: String,
    pub languages_path: String,

    /// OS-level service name (systemd unit, Windows service)
    pub managed_service: Option<String>,
    /// Executable to spawn when no managed service is available
    pub subprocess: Option<SubprocessSpec>,

    pub startup_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Bounded wait for a managed service to report running after a start request
    pub service_start_wait_secs: u64,
    pub readiness_interval_ms: u64,
    /// Timeout for a single health probe
    pub probe_timeout_ms: u64,
    /// Grace period between terminate and force-kill
    pub stop_timeout_secs: u64,
    /// Liveness probe period while Ready/Degraded
    pub monitor_interval_secs: u64,
    /// Consecutive failed liveness probes treated as a crash
    pub unhealthy_threshold: u32,
    /// Maximum age of the last probe for the engine to count as healthy
    pub freshness_window_secs: u64,
    /// Stop an already-running service we attached to on shutdown
    pub release_attached_service: bool,

    pub restart: RestartPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001".to_string(),
            health_path: "/health".to_string(),
            translate_path: "/translate".to_string(),
            languages_path: "/languages".to_string(),
            managed_service: None,
            subprocess: None,
            startup_timeout_secs: 120,
            request_timeout_secs: 30,
            service_start_wait_secs: 30,
            readiness_interval_ms: 2_000,
            probe_timeout_ms: 2_000,
            stop_timeout_secs: 10,
            monitor_interval_secs: 10,
            unhealthy_threshold: 3,
            freshness_window_secs: 30,
            release_attached_service: false,
            restart: RestartPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn service_start_wait(&self) -> Duration {
        Duration::from_secs(self.service_start_wait_secs)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    /// Join `base_url` and an endpoint path without doubling slashes
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "engine.base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.managed_service.is_none() && self.subprocess.is_none() {
            return Err(AppError::Config(
                "no startup strategy: set engine.managed_service and/or engine.subprocess"
                    .to_string(),
            ));
        }
        if let Some(spec) = &self.subprocess {
            if spec.program.as_os_str().is_empty() {
                return Err(AppError::Config(
                    "engine.subprocess.program is empty".to_string(),
                ));
            }
        }
        if self.startup_timeout_secs == 0
            || self.request_timeout_secs == 0
            || self.readiness_interval_ms == 0
            || self.probe_timeout_ms == 0
            || self.monitor_interval_secs == 0
        {
            return Err(AppError::Config("engine timeouts must be non-zero".to_string()));
        }
        if self.readiness_interval() >= self.startup_timeout() {
            return Err(AppError::Config(
                "engine.readiness_interval_ms must be below the startup timeout".to_string(),
            ));
        }
        if self.monitor_interval_secs >= self.freshness_window_secs {
            return Err(AppError::Config(format!(
                "engine.monitor_interval_secs ({}) must be below freshness_window_secs ({})",
                self.monitor_interval_secs, self.freshness_window_secs
            )));
        }
        Ok(())
    }
}

/// Child process launch description
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables (inherits the host environment otherwise)
    pub env: BTreeMap<String, String>,
}

impl SubprocessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Auto-restart policy (linear backoff, capped)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// A Ready period at least this long resets the attempt counter
    pub reset_after_secs: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff_secs: 5,
            max_backoff_secs: 60,
            reset_after_secs: 300,
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// LRU bound; 0 disables it
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
    pub languages_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            max_entries: 10_000,
            sweep_interval_secs: 60,
            languages_ttl_secs: 86_400,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn capacity(&self) -> Option<usize> {
        (self.max_entries > 0).then_some(self.max_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subprocess_config() -> EngineConfig {
        EngineConfig {
            subprocess: Some(SubprocessSpec::new("python3").arg("app.py")),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_require_a_strategy() {
        let err = EngineConfig::default().validate().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(subprocess_config().validate().is_ok());
    }

    #[test]
    fn test_monitor_interval_must_fit_freshness_window() {
        let config = EngineConfig {
            monitor_interval_secs: 30,
            freshness_window_secs: 30,
            ..subprocess_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let config = EngineConfig {
            base_url: "localhost:5001".into(),
            ..subprocess_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let config = EngineConfig {
            base_url: "http://127.0.0.1:5001/".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint("/health"), "http://127.0.0.1:5001/health");
        assert_eq!(config.endpoint("translate"), "http://127.0.0.1:5001/translate");
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"managed_service":"linguard-engine","restart":{"max_attempts":5}}"#,
        )
        .unwrap();
        assert_eq!(config.managed_service.as_deref(), Some("linguard-engine"));
        assert_eq!(config.restart.max_attempts, 5);
        assert_eq!(config.restart.backoff_secs, 5);
        assert_eq!(config.startup_timeout_secs, 120);
    }

    #[test]
    fn test_cache_capacity_zero_is_unbounded() {
        let cache = CacheConfig {
            max_entries: 0,
            ..Default::default()
        };
        assert_eq!(cache.capacity(), None);
        assert_eq!(CacheConfig::default().capacity(), Some(10_000));
    }
}
