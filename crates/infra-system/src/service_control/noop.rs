use async_trait::async_trait;
use std::time::Duration;

use linguard_core::port::{ProcessProbe, ServiceControlError};

/// For hosts without a service manager (containers, macOS).
///
/// Reports every service as stopped and refuses to start one, so the
/// supervisor falls through to the subprocess strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopServiceControl;

#[async_trait]
impl ProcessProbe for NoopServiceControl {
    async fn is_running(&self, _service: &str) -> Result<bool, ServiceControlError> {
        Ok(false)
    }

    async fn start(&self, service: &str, _wait: Duration) -> Result<(), ServiceControlError> {
        Err(ServiceControlError::Unsupported(format!(
            "no service manager to start {service}"
        )))
    }

    async fn stop(&self, service: &str, _wait: Duration) -> Result<(), ServiceControlError> {
        Err(ServiceControlError::Unsupported(format!(
            "no service manager to stop {service}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_never_runs_services() {
        let probe = NoopServiceControl;
        assert!(!probe.is_running("engine").await.unwrap());
        assert!(matches!(
            probe.start("engine", Duration::from_secs(1)).await,
            Err(ServiceControlError::Unsupported(_))
        ));
    }
}
