// Service control adapters (ProcessProbe implementations)
// Selected per platform at startup; the supervisor only sees the trait.

mod noop;
mod systemd;
mod windows;

pub use noop::NoopServiceControl;
pub use systemd::SystemdServiceControl;
pub use windows::WindowsServiceControl;

use std::io;
use std::path::Path;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Instant};
use tracing::{trace, warn};

use linguard_core::port::{ProcessProbe, ServiceControlError};

/// Delay between state queries while waiting for a service
pub const STATE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on a single state query command
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Service control for the current platform
pub fn platform_service_control() -> Arc<dyn ProcessProbe> {
    if cfg!(windows) {
        Arc::new(WindowsServiceControl::new())
    } else if cfg!(target_os = "linux") && std::path::Path::new("/run/systemd/system").exists() {
        Arc::new(SystemdServiceControl::new())
    } else {
        Arc::new(NoopServiceControl)
    }
}

/// Poll `is_running` until it equals `want` or `wait` elapses
pub(crate) async fn wait_for_state<P>(
    probe: &P,
    service: &str,
    want: bool,
    wait: Duration,
) -> Result<(), ServiceControlError>
where
    P: ProcessProbe + ?Sized,
{
    let deadline = Instant::now() + wait;
    loop {
        if probe.is_running(service).await? == want {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ServiceControlError::Timeout {
                service: service.to_string(),
                target: if want { "running" } else { "stopped" },
                waited: wait,
            });
        }
        sleep(STATE_POLL_INTERVAL.min(deadline - Instant::now())).await;
    }
}

/// Run a service manager command and capture its output.
///
/// The command is killed if it has not finished within `limit`.
pub(crate) async fn run_command(
    program: &Path,
    args: &[&str],
    limit: Duration,
) -> Result<Output, ServiceControlError> {
    trace!(program = %program.display(), ?args, "Running service command");
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();
    match timeout(limit, output).await {
        Ok(result) => result.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ServiceControlError::Unsupported(format!("{} not available", program.display()))
            }
            _ => ServiceControlError::CommandFailed(format!("{}: {e}", program.display())),
        }),
        Err(_) => {
            warn!(program = %program.display(), ?args, limit_secs = limit.as_secs(), "Service command timed out, killed");
            Err(ServiceControlError::CommandFailed(format!(
                "{} {} timed out after {limit:?}",
                program.display(),
                args.join(" ")
            )))
        }
    }
}

/// Trimmed stderr, falling back to stdout (sc.exe reports errors on stdout)
pub(crate) fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    }
}
