// Process Probe Port - OS-level service control
//
// Implementations: systemd (systemctl), Windows SCM (sc.exe), no-op for
// containerized engines. The supervisor state machine only sees this trait.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Service control errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceControlError {
    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Service control unsupported on this host: {0}")]
    Unsupported(String),

    #[error("Service '{service}' did not reach {target} within {waited:?}")]
    Timeout {
        service: String,
        target: &'static str,
        waited: Duration,
    },

    #[error("Service control command failed: {0}")]
    CommandFailed(String),
}

/// Query/start/stop a named OS service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Whether the service is currently running
    async fn is_running(&self, service: &str) -> Result<bool, ServiceControlError>;

    /// Request a start and block until the service reports running
    ///
    /// # Arguments
    /// * `service` - Service name (unit name, SCM name)
    /// * `wait` - Upper bound on the wait for the running state
    async fn start(&self, service: &str, wait: Duration) -> Result<(), ServiceControlError>;

    /// Request a stop and block (bounded) until the service reports stopped
    async fn stop(&self, service: &str, wait: Duration) -> Result<(), ServiceControlError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory service table
    #[derive(Default)]
    pub struct FakeProcessProbe {
        running: Mutex<HashMap<String, bool>>,
        start_error: Mutex<Option<ServiceControlError>>,
        start_calls: Mutex<Vec<String>>,
        stop_calls: Mutex<Vec<String>>,
        start_delay: Mutex<Option<Duration>>,
    }

    impl FakeProcessProbe {
        pub fn new() -> Self {
            Self::default()
        }

        /// Service already running before the supervisor looks at it
        pub fn with_running(service: &str) -> Self {
            let probe = Self::new();
            probe.set_running(service, true);
            probe
        }

        pub fn set_running(&self, service: &str, running: bool) {
            self.running
                .lock()
                .unwrap()
                .insert(service.to_string(), running);
        }

        /// Make every subsequent `start` fail with `err`
        pub fn fail_starts_with(&self, err: ServiceControlError) {
            *self.start_error.lock().unwrap() = Some(err);
        }

        /// Every subsequent `start` sleeps for `delay` first, ignoring its wait
        pub fn delay_starts_by(&self, delay: Duration) {
            *self.start_delay.lock().unwrap() = Some(delay);
        }

        pub fn start_calls(&self) -> Vec<String> {
            self.start_calls.lock().unwrap().clone()
        }

        pub fn stop_calls(&self) -> Vec<String> {
            self.stop_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessProbe for FakeProcessProbe {
        async fn is_running(&self, service: &str) -> Result<bool, ServiceControlError> {
            match self.running.lock().unwrap().get(service) {
                Some(running) => Ok(*running),
                None => Err(ServiceControlError::NotFound(service.to_string())),
            }
        }

        async fn start(&self, service: &str, _wait: Duration) -> Result<(), ServiceControlError> {
            self.start_calls.lock().unwrap().push(service.to_string());
            let delay = *self.start_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.start_error.lock().unwrap().clone() {
                return Err(err);
            }
            self.set_running(service, true);
            Ok(())
        }

        async fn stop(&self, service: &str, _wait: Duration) -> Result<(), ServiceControlError> {
            self.stop_calls.lock().unwrap().push(service.to_string());
            self.set_running(service, false);
            Ok(())
        }
    }
}
