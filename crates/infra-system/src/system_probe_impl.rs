// Host process probe
// reason: sysinfo for cross-platform process/host metrics (ADR-001)
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use sysinfo::{Pid, System};
use tracing::{debug, warn};

use linguard_core::domain::{HostMetrics, SystemInfo};
use linguard_core::port::SystemProbe;

/// System probe for the hosting process using sysinfo
///
/// CPU% is measured between two consecutive `metrics()` calls, so the first
/// sample after startup reads 0.
pub struct SystemProbeImpl {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
}

impl SystemProbeImpl {
    /// Create a new system probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = SystemProbeImpl::new();
    /// ```
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = e, "Current process id unavailable, process metrics disabled");
                None
            }
        };
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
            pid,
            started: Instant::now(),
        }
    }

    fn system(&self) -> MutexGuard<'_, System> {
        // A panicked sampler leaves System in a usable state
        self.system.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SystemProbeImpl {
    fn default() -> Self {
        Self::new()
    }
}

/// Docker leaves `/.dockerenv`; podman and systemd-nspawn set `container`
fn in_container() -> bool {
    Path::new("/.dockerenv").exists() || std::env::var_os("container").is_some()
}

impl SystemProbe for SystemProbeImpl {
    fn metrics(&self) -> HostMetrics {
        let mut sys = self.system();
        sys.refresh_memory();
        sys.refresh_cpu();

        let mut metrics = HostMetrics {
            uptime_secs: self.started.elapsed().as_secs(),
            host_total_memory_bytes: sys.total_memory(),
            host_used_memory_bytes: sys.used_memory(),
            cpu_count: sys.cpus().len(),
            ..Default::default()
        };

        if let Some(pid) = self.pid {
            if sys.refresh_process(pid) {
                if let Some(process) = sys.process(pid) {
                    metrics.cpu_usage_percent = process.cpu_usage();
                    metrics.memory_rss_bytes = process.memory();
                    metrics.virtual_memory_bytes = process.virtual_memory();
                    metrics.thread_count = process.tasks().map(|tasks| tasks.len()).unwrap_or(1);
                }
            }
        }

        debug!(
            cpu = %metrics.cpu_usage_percent,
            rss_bytes = metrics.memory_rss_bytes,
            threads = metrics.thread_count,
            "Host metrics collected"
        );
        metrics
    }

    fn system_info(&self) -> SystemInfo {
        let cpu_count = self.system().cpus().len();
        SystemInfo {
            host_name: System::host_name(),
            os_name: System::name(),
            os_version: System::os_version(),
            kernel_version: System::kernel_version(),
            cpu_count,
            process_id: std::process::id(),
            in_container: in_container(),
            version: linguard_core::VERSION.to_string(),
        }
    }
}
