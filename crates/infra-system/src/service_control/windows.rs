// Windows Service Control Manager (sc.exe) service control
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{failure_text, run_command, wait_for_state, QUERY_TIMEOUT};
use linguard_core::port::{ProcessProbe, ServiceControlError};

// sc.exe error codes
const ERROR_SERVICE_DOES_NOT_EXIST: &str = "1060";
const ERROR_SERVICE_ALREADY_RUNNING: &str = "1056";
const ERROR_SERVICE_NOT_ACTIVE: &str = "1062";

pub struct WindowsServiceControl {
    program: PathBuf,
}

impl WindowsServiceControl {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("sc.exe"),
        }
    }

    async fn control(
        &self,
        verb: &str,
        service: &str,
        benign: &str,
        limit: Duration,
    ) -> Result<(), ServiceControlError> {
        let output = run_command(&self.program, &[verb, service], limit).await?;
        let text = failure_text(&output);
        if output.status.success() || text.contains(benign) {
            return Ok(());
        }
        if text.contains(ERROR_SERVICE_DOES_NOT_EXIST) {
            return Err(ServiceControlError::NotFound(service.to_string()));
        }
        Err(ServiceControlError::CommandFailed(format!(
            "sc.exe {verb} {service}: {text}"
        )))
    }
}

impl Default for WindowsServiceControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `sc.exe query <service>` output
fn parse_query(service: &str, stdout: &str) -> Result<bool, ServiceControlError> {
    if stdout.contains(ERROR_SERVICE_DOES_NOT_EXIST) {
        return Err(ServiceControlError::NotFound(service.to_string()));
    }
    let state = stdout
        .lines()
        .find(|line| line.trim_start().starts_with("STATE"))
        .ok_or_else(|| {
            ServiceControlError::CommandFailed(format!("no STATE in sc.exe output for {service}"))
        })?;
    Ok(state.contains("RUNNING"))
}

#[async_trait]
impl ProcessProbe for WindowsServiceControl {
    async fn is_running(&self, service: &str) -> Result<bool, ServiceControlError> {
        let output = run_command(&self.program, &["query", service], QUERY_TIMEOUT).await?;
        let running = parse_query(service, &String::from_utf8_lossy(&output.stdout))?;
        debug!(service, running, "Windows service state");
        Ok(running)
    }

    async fn start(&self, service: &str, wait: Duration) -> Result<(), ServiceControlError> {
        info!(service, "sc.exe start");
        let deadline = Instant::now() + wait;
        self.control("start", service, ERROR_SERVICE_ALREADY_RUNNING, wait)
            .await?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        wait_for_state(self, service, true, remaining).await
    }

    async fn stop(&self, service: &str, wait: Duration) -> Result<(), ServiceControlError> {
        info!(service, "sc.exe stop");
        let deadline = Instant::now() + wait;
        self.control("stop", service, ERROR_SERVICE_NOT_ACTIVE, wait)
            .await?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        wait_for_state(self, service, false, remaining).await
    }
}
