// Readiness Poller
//
// One lightweight probe per tick until a 2xx answer or the deadline.
// Connection refused/reset counts as "not yet ready"; only the deadline fails.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::application::cancel::CancelToken;
use crate::domain::ProbeRecord;
use crate::port::{HealthEndpoint, ProbeOutcome, TimeProvider};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("engine not ready after {attempts} probes in {waited:?} (last: {last_detail:?})")]
    Timeout {
        waited: Duration,
        attempts: u32,
        last_detail: Option<String>,
    },

    #[error("readiness wait cancelled")]
    Cancelled,
}

/// Last probe result, shared between the poller (writer) and health readers
#[derive(Clone, Default)]
pub struct ProbeLedger {
    last: Arc<RwLock<Option<ProbeRecord>>>,
}

impl ProbeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: ProbeRecord) {
        if let Ok(mut last) = self.last.write() {
            *last = Some(record);
        }
    }

    /// Copy of the most recent probe result
    pub fn last(&self) -> Option<ProbeRecord> {
        self.last.read().ok().and_then(|last| last.clone())
    }
}

pub struct ReadinessPoller {
    endpoint: Arc<dyn HealthEndpoint>,
    interval: Duration,
    probe_timeout: Duration,
    ledger: ProbeLedger,
    clock: Arc<dyn TimeProvider>,
}

impl ReadinessPoller {
    /// Create a poller
    ///
    /// # Arguments
    /// * `endpoint` - Engine health endpoint
    /// * `interval` - Delay between probes (~2s)
    /// * `probe_timeout` - Upper bound for a single probe
    /// * `ledger` - Where every probe result is recorded
    /// * `clock` - Timestamps for recorded results
    pub fn new(
        endpoint: Arc<dyn HealthEndpoint>,
        interval: Duration,
        probe_timeout: Duration,
        ledger: ProbeLedger,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            endpoint,
            interval,
            probe_timeout,
            ledger,
            clock,
        }
    }

    pub fn ledger(&self) -> &ProbeLedger {
        &self.ledger
    }

    pub fn target(&self) -> &str {
        self.endpoint.target()
    }

    /// Issue exactly one probe and record its result
    pub async fn probe_once(&self) -> ProbeRecord {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.probe_timeout, self.endpoint.check()).await
        {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::not_ready(format!(
                "probe timed out after {}ms",
                self.probe_timeout.as_millis()
            )),
        };
        let record = ProbeRecord {
            success: outcome.ready,
            at: self.clock.now(),
            latency: started.elapsed(),
            detail: outcome.detail,
        };
        self.ledger.record(record.clone());
        record
    }

    /// Poll until the engine answers 2xx, `timeout` elapses or `cancel` fires
    pub async fn wait_until_ready(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ProbeRecord, ReadinessError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = 0u32;
        let mut last_detail = None;

        let timed_out = |attempts, last_detail| ReadinessError::Timeout {
            waited: started.elapsed(),
            attempts,
            last_detail,
        };

        loop {
            attempts += 1;
            let probe = tokio::time::timeout_at(deadline, self.probe_once());
            let record = tokio::select! {
                _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                probed = probe => match probed {
                    Ok(record) => record,
                    Err(_) => return Err(timed_out(attempts, last_detail)),
                },
            };

            if record.success {
                debug!(
                    endpoint = %self.endpoint.target(),
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Engine health endpoint ready"
                );
                return Ok(record);
            }

            trace!(attempt = attempts, detail = ?record.detail, "Engine not ready yet");
            last_detail = record.detail;

            let next = (Instant::now() + self.interval).min(deadline);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                _ = tokio::time::sleep_until(next) => {}
            }
            if Instant::now() >= deadline {
                return Err(timed_out(attempts, last_detail));
            }
        }
    }
}
