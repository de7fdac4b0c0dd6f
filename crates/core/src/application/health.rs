// Health Aggregator
//
// Pure read model: supervisor status + last probe + host metrics.
// Never awaits, never probes the engine itself.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::readiness::ProbeLedger;
use crate::application::supervisor::StatusReader;
use crate::domain::{
    HealthCheck, HealthSnapshot, HealthStatus, HostMetrics, ProbeRecord, SupervisorState,
    SupervisorStatus, SystemInfo,
};
use crate::port::{SystemProbe, TimeProvider};

/// Composite status from the supervisor state and probe freshness
pub fn overall(state: SupervisorState, probe_fresh: bool) -> HealthStatus {
    match state {
        SupervisorState::Ready if probe_fresh => HealthStatus::Healthy,
        SupervisorState::Ready
        | SupervisorState::Starting
        | SupervisorState::Degraded
        | SupervisorState::Restarting => HealthStatus::Degraded,
        SupervisorState::NotStarted | SupervisorState::Stopped | SupervisorState::Failed => {
            HealthStatus::Unhealthy
        }
    }
}

pub struct HealthAggregator {
    status: StatusReader,
    ledger: ProbeLedger,
    system: Arc<dyn SystemProbe>,
    clock: Arc<dyn TimeProvider>,
    freshness: Duration,
    engine_url: String,
}

impl HealthAggregator {
    /// Create an aggregator
    ///
    /// # Arguments
    /// * `status` - Supervisor status reader
    /// * `ledger` - Last engine probe, written by the readiness poller
    /// * `system` - Host process metrics
    /// * `clock` - Used to age the last probe
    /// * `freshness` - Maximum probe age for Healthy
    /// * `engine_url` - Reported in the engine check
    pub fn new(
        status: StatusReader,
        ledger: ProbeLedger,
        system: Arc<dyn SystemProbe>,
        clock: Arc<dyn TimeProvider>,
        freshness: Duration,
        engine_url: impl Into<String>,
    ) -> Self {
        Self {
            status,
            ledger,
            system,
            clock,
            freshness,
            engine_url: engine_url.into(),
        }
    }

    /// Assemble a snapshot from current state
    pub fn snapshot(&self) -> HealthSnapshot {
        let started = Instant::now();
        let now = self.clock.now();
        let supervisor = self.status.current();
        let last_probe = self.ledger.last();

        let probe_age = last_probe
            .as_ref()
            .map(|probe| (now - probe.at).to_std().unwrap_or(Duration::ZERO));
        let probe_fresh = matches!(
            (&last_probe, probe_age),
            (Some(probe), Some(age)) if probe.success && age <= self.freshness
        );
        let status = overall(supervisor.state, probe_fresh);
        let host = self.system.metrics();

        let checks = vec![
            self.engine_check(last_probe.as_ref(), probe_age, probe_fresh),
            supervisor_check(&supervisor),
            host_check(&host),
        ];

        HealthSnapshot {
            status,
            supervisor,
            last_probe,
            probe_fresh,
            host,
            checks,
            taken_at: now,
            duration: started.elapsed(),
        }
    }

    pub fn metrics(&self) -> HostMetrics {
        self.system.metrics()
    }

    pub fn system_info(&self) -> SystemInfo {
        self.system.system_info()
    }

    fn engine_check(
        &self,
        probe: Option<&ProbeRecord>,
        age: Option<Duration>,
        fresh: bool,
    ) -> HealthCheck {
        let mut data = BTreeMap::new();
        data.insert("url".to_string(), self.engine_url.clone());

        let (status, description) = match (probe, age) {
            (Some(probe), Some(age)) => {
                data.insert("last_probe_at".to_string(), probe.at.to_rfc3339());
                data.insert("age_secs".to_string(), age.as_secs().to_string());
                data.insert(
                    "latency_ms".to_string(),
                    probe.latency.as_millis().to_string(),
                );
                if let Some(detail) = &probe.detail {
                    data.insert("detail".to_string(), detail.clone());
                }
                if fresh {
                    (HealthStatus::Healthy, "Engine answered its health endpoint")
                } else if probe.success {
                    (HealthStatus::Degraded, "Last engine probe is stale")
                } else {
                    (HealthStatus::Unhealthy, "Last engine probe failed")
                }
            }
            _ => (HealthStatus::Unhealthy, "Engine has not been probed yet"),
        };

        HealthCheck {
            name: "engine".to_string(),
            status,
            description: description.to_string(),
            data,
        }
    }
}

fn supervisor_check(status: &SupervisorStatus) -> HealthCheck {
    let mut data = BTreeMap::new();
    data.insert("state".to_string(), status.state.to_string());
    data.insert(
        "restart_attempts".to_string(),
        status.restart_attempts.to_string(),
    );
    if let Some(pid) = status.pid {
        data.insert("pid".to_string(), pid.to_string());
    }
    if let Some(error) = &status.last_error {
        data.insert("last_error".to_string(), error.clone());
    }
    if let Some(exit) = status.last_exit {
        data.insert("last_exit".to_string(), exit.to_string());
    }

    let check_status = match status.state {
        SupervisorState::Ready => HealthStatus::Healthy,
        SupervisorState::NotStarted | SupervisorState::Stopped | SupervisorState::Failed => {
            HealthStatus::Unhealthy
        }
        _ => HealthStatus::Degraded,
    };

    HealthCheck {
        name: "supervisor".to_string(),
        status: check_status,
        description: format!("Engine supervisor is {}", status.state),
        data,
    }
}

// Host metrics are informational only
fn host_check(host: &HostMetrics) -> HealthCheck {
    let mut data = BTreeMap::new();
    data.insert("uptime_secs".to_string(), host.uptime_secs.to_string());
    data.insert(
        "cpu_usage_percent".to_string(),
        format!("{:.1}", host.cpu_usage_percent),
    );
    data.insert(
        "memory_rss_bytes".to_string(),
        host.memory_rss_bytes.to_string(),
    );
    data.insert("thread_count".to_string(), host.thread_count.to_string());

    HealthCheck {
        name: "host".to_string(),
        status: HealthStatus::Healthy,
        description: "Hosting process metrics".to_string(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::supervisor::StateCell;
    use crate::domain::LifecycleEvent;
    use crate::port::system_probe::mocks::MockSystemProbe;
    use crate::port::time_provider::mocks::ManualClock;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        cell: StateCell,
        ledger: ProbeLedger,
        clock: Arc<ManualClock>,
        aggregator: HealthAggregator,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let cell = StateCell::new(clock.clone());
        let ledger = ProbeLedger::new();
        let aggregator = HealthAggregator::new(
            cell.reader(),
            ledger.clone(),
            Arc::new(MockSystemProbe::new(12.5)),
            clock.clone(),
            Duration::from_secs(30),
            "http://127.0.0.1:5001",
        );
        Fixture {
            cell,
            ledger,
            clock,
            aggregator,
        }
    }

    fn probe(f: &Fixture, success: bool) {
        f.ledger.record(ProbeRecord {
            success,
            at: f.clock.now(),
            latency: Duration::from_millis(8),
            detail: Some(if success { "200 OK" } else { "connection refused" }.to_string()),
        });
    }

    fn make_ready(f: &Fixture) {
        f.cell.begin_start().unwrap();
        f.cell.apply(LifecycleEvent::ReadinessConfirmed).unwrap();
    }

    #[test]
    fn test_overall_mapping() {
        use HealthStatus::*;
        use SupervisorState as S;
        assert_eq!(overall(S::Ready, true), Healthy);
        assert_eq!(overall(S::Ready, false), Degraded);
        assert_eq!(overall(S::Starting, true), Degraded);
        assert_eq!(overall(S::Degraded, true), Degraded);
        assert_eq!(overall(S::Restarting, false), Degraded);
        assert_eq!(overall(S::NotStarted, false), Unhealthy);
        assert_eq!(overall(S::Stopped, true), Unhealthy);
        assert_eq!(overall(S::Failed, true), Unhealthy);
    }

    #[test]
    fn test_ready_with_fresh_probe_is_healthy() {
        let f = fixture();
        make_ready(&f);
        probe(&f, true);
        f.clock.advance(Duration::from_secs(10));

        let snapshot = f.aggregator.snapshot();
        assert!(snapshot.is_healthy());
        assert!(snapshot.probe_fresh);
        let names: Vec<_> = snapshot.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["engine", "supervisor", "host"]);
        assert_eq!(snapshot.checks[0].data["age_secs"], "10");
        assert_eq!(snapshot.checks[2].data["cpu_usage_percent"], "12.5");
    }

    #[test]
    fn test_stale_probe_degrades() {
        let f = fixture();
        make_ready(&f);
        probe(&f, true);
        f.clock.advance(Duration::from_secs(31));

        let snapshot = f.aggregator.snapshot();
        assert_eq!(snapshot.status, HealthStatus::Degraded);
        assert!(!snapshot.probe_fresh);
        assert_eq!(snapshot.checks[0].status, HealthStatus::Degraded);
    }

    #[test]
    fn test_failed_probe_degrades_ready_engine() {
        let f = fixture();
        make_ready(&f);
        probe(&f, false);

        let snapshot = f.aggregator.snapshot();
        assert_eq!(snapshot.status, HealthStatus::Degraded);
        assert_eq!(snapshot.checks[0].status, HealthStatus::Unhealthy);
        assert_eq!(snapshot.checks[0].data["detail"], "connection refused");
    }

    #[test]
    fn test_failed_supervisor_is_unhealthy_despite_fresh_probe() {
        let f = fixture();
        f.cell.begin_start().unwrap();
        f.cell
            .apply(LifecycleEvent::StartupFailed {
                reason: "Engine did not become ready within 10s".into(),
            })
            .unwrap();
        probe(&f, true);

        let snapshot = f.aggregator.snapshot();
        assert_eq!(snapshot.status, HealthStatus::Unhealthy);
        assert_eq!(snapshot.supervisor.state, SupervisorState::Failed);
        assert_eq!(
            snapshot.checks[1].data["last_error"],
            "Engine did not become ready within 10s"
        );
    }

    #[test]
    fn test_never_probed_engine() {
        let f = fixture();
        let snapshot = f.aggregator.snapshot();
        assert_eq!(snapshot.status, HealthStatus::Unhealthy);
        assert!(snapshot.last_probe.is_none());
        assert_eq!(snapshot.checks[0].status, HealthStatus::Unhealthy);
        assert_eq!(snapshot.taken_at, f.clock.now());
    }
}
