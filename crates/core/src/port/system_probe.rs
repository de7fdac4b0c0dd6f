// Host process metrics port
// reason: sync on purpose - health snapshots must never await (ADR-001)

use crate::domain::{HostMetrics, SystemInfo};

/// Probe for the *hosting* process, not the engine.
///
/// Informational only; never used for readiness decisions.
pub trait SystemProbe: Send + Sync {
    /// Sample CPU%, memory, threads and uptime of this process
    ///
    /// # Example
    /// ```text
    /// let metrics = probe.metrics();
    /// println!("rss={} threads={}", metrics.memory_rss_bytes, metrics.thread_count);
    /// ```
    fn metrics(&self) -> HostMetrics;

    /// Static host facts (OS, host name, container detection)
    fn system_info(&self) -> SystemInfo;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock SystemProbe returning fixed values
    pub struct MockSystemProbe {
        metrics: Mutex<HostMetrics>,
    }

    impl MockSystemProbe {
        pub fn new(cpu_usage_percent: f32) -> Self {
            Self {
                metrics: Mutex::new(HostMetrics {
                    cpu_usage_percent,
                    memory_rss_bytes: 64 * 1024 * 1024,
                    virtual_memory_bytes: 512 * 1024 * 1024,
                    thread_count: 8,
                    uptime_secs: 42,
                    host_total_memory_bytes: 8 * 1024 * 1024 * 1024,
                    host_used_memory_bytes: 4 * 1024 * 1024 * 1024,
                    cpu_count: 4,
                }),
            }
        }

        pub fn set_uptime(&self, uptime_secs: u64) {
            self.metrics.lock().unwrap().uptime_secs = uptime_secs;
        }
    }

    impl SystemProbe for MockSystemProbe {
        fn metrics(&self) -> HostMetrics {
            self.metrics.lock().unwrap().clone()
        }

        fn system_info(&self) -> SystemInfo {
            SystemInfo {
                host_name: Some("test-host".to_string()),
                cpu_count: 4,
                process_id: std::process::id(),
                version: crate::VERSION.to_string(),
                ..Default::default()
            }
        }
    }
}
