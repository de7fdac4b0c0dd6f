// systemd (systemctl) service control
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{failure_text, run_command, wait_for_state, QUERY_TIMEOUT};
use linguard_core::port::{ProcessProbe, ServiceControlError};

pub struct SystemdServiceControl {
    program: PathBuf,
}

impl SystemdServiceControl {
    pub fn new() -> Self {
        Self::with_program("systemctl")
    }

    /// Use a specific `systemctl` binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn control(
        &self,
        verb: &str,
        service: &str,
        limit: Duration,
    ) -> Result<(), ServiceControlError> {
        let output = run_command(&self.program, &[verb, service], limit).await?;
        if output.status.success() {
            return Ok(());
        }
        let text = failure_text(&output);
        if text.contains("not found") || text.contains("not loaded") {
            Err(ServiceControlError::NotFound(service.to_string()))
        } else {
            Err(ServiceControlError::CommandFailed(format!(
                "systemctl {verb} {service}: {text}"
            )))
        }
    }
}

impl Default for SystemdServiceControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `systemctl show --property=LoadState,ActiveState --value` output
fn parse_show(service: &str, stdout: &str) -> Result<bool, ServiceControlError> {
    let mut lines = stdout.lines().map(str::trim);
    let load_state = lines.next().unwrap_or_default();
    let active_state = lines.next().unwrap_or_default();
    if load_state == "not-found" {
        return Err(ServiceControlError::NotFound(service.to_string()));
    }
    Ok(matches!(active_state, "active" | "reloading"))
}

#[async_trait]
impl ProcessProbe for SystemdServiceControl {
    async fn is_running(&self, service: &str) -> Result<bool, ServiceControlError> {
        let output = run_command(
            &self.program,
            &["show", service, "--property=LoadState,ActiveState", "--value"],
            QUERY_TIMEOUT,
        )
        .await?;
        if !output.status.success() {
            return Err(ServiceControlError::CommandFailed(failure_text(&output)));
        }
        let running = parse_show(service, &String::from_utf8_lossy(&output.stdout))?;
        debug!(service, running, "systemd service state");
        Ok(running)
    }

    async fn start(&self, service: &str, wait: Duration) -> Result<(), ServiceControlError> {
        info!(service, "systemctl start");
        // systemctl start blocks until the unit's job is done; one deadline covers both
        let deadline = Instant::now() + wait;
        self.control("start", service, wait).await?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        wait_for_state(self, service, true, remaining).await
    }

    async fn stop(&self, service: &str, wait: Duration) -> Result<(), ServiceControlError> {
        info!(service, "systemctl stop");
        let deadline = Instant::now() + wait;
        self.control("stop", service, wait).await?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        wait_for_state(self, service, false, remaining).await
    }
}
