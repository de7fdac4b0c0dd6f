// Engine subprocess launcher
// reason: tokio::process for async child management, nix for signals (ADR-002)
use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use linguard_core::domain::{ExitInfo, SubprocessSpec};
use linguard_core::port::{ChildHandle, LaunchError, ProcessLauncher};

/// Log target for lines the engine writes to stdout/stderr
pub const ENGINE_LOG_TARGET: &str = "linguard::engine";

/// How long to wait for the exit status after a forced kill
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Spawns the engine with piped output and reaps it on a background task.
///
/// The child is killed if the reaper task is dropped (runtime shutdown).
#[derive(Debug, Default, Clone)]
pub struct SubprocessLauncher;

impl SubprocessLauncher {
    pub fn new() -> Self {
        Self
    }
}

fn launch_error(spec: &SubprocessSpec, err: io::Error) -> LaunchError {
    let program = spec.program.display().to_string();
    match err.kind() {
        io::ErrorKind::NotFound => LaunchError::NotFound(program),
        io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied(program),
        _ => LaunchError::SpawnFailed(format!("{program}: {err}")),
    }
}

fn exit_info(status: ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    ExitInfo {
        code: status.code(),
        signal,
    }
}

/// Forward each output line of the engine into the log
fn pump<R>(reader: R, pid: u32, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if is_stderr => warn!(target: ENGINE_LOG_TARGET, pid, "{}", line),
                Ok(Some(line)) => info!(target: ENGINE_LOG_TARGET, pid, "{}", line),
                Ok(None) => break,
                Err(e) => {
                    debug!(pid, error = %e, "Engine output stream closed");
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl ProcessLauncher for SubprocessLauncher {
    async fn spawn(&self, spec: &SubprocessSpec) -> Result<ChildHandle, LaunchError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| launch_error(spec, e))?;
        let pid = child.id().ok_or_else(|| {
            LaunchError::SpawnFailed(format!("{}: exited before its pid was read", spec.display()))
        })?;

        if let Some(stdout) = child.stdout.take() {
            pump(stdout, pid, false);
        }
        if let Some(stderr) = child.stderr.take() {
            pump(stderr, pid, true);
        }

        let (reporter, handle) = ChildHandle::channel(pid);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let info = exit_info(status);
                    debug!(pid, exit = %info, "Engine process reaped");
                    reporter.report(info);
                }
                Err(e) => {
                    warn!(pid, error = %e, "Failed to wait for engine process");
                    reporter.report(ExitInfo::default());
                }
            }
        });

        Ok(handle)
    }

    async fn terminate(&self, child: &ChildHandle, grace: Duration) -> Result<ExitInfo, LaunchError> {
        if let Some(exit) = child.exit_info() {
            return Ok(exit);
        }
        let pid = child.pid();

        info!(pid, grace_secs = grace.as_secs(), "Requesting engine shutdown");
        request_exit(pid).await?;
        if let Ok(exit) = timeout(grace, child.exited()).await {
            return Ok(exit);
        }

        warn!(pid, "Engine did not exit in time, killing it");
        force_kill(pid).await?;
        timeout(KILL_WAIT, child.exited())
            .await
            .map_err(|_| LaunchError::SignalFailed(format!("process {pid} survived a forced kill")))
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), LaunchError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| LaunchError::SignalFailed(format!("pid {pid} out of range")))?;
    match kill(Pid::from_raw(raw), signal) {
        // Already gone; the reaper reports the exit
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(LaunchError::SignalFailed(format!("{signal} to {pid}: {e}"))),
    }
}

#[cfg(unix)]
async fn request_exit(pid: u32) -> Result<(), LaunchError> {
    send_signal(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
async fn force_kill(pid: u32) -> Result<(), LaunchError> {
    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(windows)]
async fn taskkill(pid: u32, force: bool) -> Result<(), LaunchError> {
    let pid_arg = pid.to_string();
    let mut args = vec!["/T", "/PID", pid_arg.as_str()];
    if force {
        args.insert(0, "/F");
    }
    let output = Command::new("taskkill")
        .args(&args)
        .output()
        .await
        .map_err(|e| LaunchError::SignalFailed(e.to_string()))?;
    if !output.status.success() {
        debug!(
            pid,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "taskkill reported failure"
        );
    }
    Ok(())
}

#[cfg(windows)]
async fn request_exit(pid: u32) -> Result<(), LaunchError> {
    taskkill(pid, false).await
}

#[cfg(windows)]
async fn force_kill(pid: u32) -> Result<(), LaunchError> {
    taskkill(pid, true).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn shell(script: &str) -> SubprocessSpec {
        SubprocessSpec::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let launcher = SubprocessLauncher::new();
        let child = launcher.spawn(&shell("exit 3")).await.unwrap();

        let exit = timeout(Duration::from_secs(5), child.exited()).await.unwrap();
        assert_eq!(exit.code, Some(3));
        assert!(child.has_exited());
    }

    #[tokio::test]
    async fn test_env_and_working_dir_are_applied() {
        let launcher = SubprocessLauncher::new();
        let mut spec = shell("[ \"$(pwd)\" = / ] && exit $ENGINE_CODE");
        spec.env.insert("ENGINE_CODE".to_string(), "7".to_string());
        spec.working_dir = Some("/".into());

        let child = launcher.spawn(&spec).await.unwrap();
        let exit = timeout(Duration::from_secs(5), child.exited()).await.unwrap();
        assert_eq!(exit.code, Some(7));
    }

    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        let launcher = SubprocessLauncher::new();
        let child = launcher.spawn(&shell("echo started; exec sleep 30")).await.unwrap();

        let exit = assert_ok!(launcher.terminate(&child, Duration::from_secs(5)).await);
        assert_eq!(exit.signal, Some(15));
        assert_eq!(exit.code, None);
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_sigkill() {
        let launcher = SubprocessLauncher::new();
        let child = launcher
            .spawn(&shell("trap '' TERM; while true; do sleep 1; done"))
            .await
            .unwrap();
        // let the shell install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let exit = launcher
            .terminate(&child, Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(exit.signal, Some(9));
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_a_noop() {
        let launcher = SubprocessLauncher::new();
        let child = launcher.spawn(&shell("exit 0")).await.unwrap();
        child.exited().await;

        let exit = launcher
            .terminate(&child, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(exit.code, Some(0));
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let launcher = SubprocessLauncher::new();
        let err = launcher
            .spawn(&SubprocessSpec::new("/nonexistent/linguard-engine"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LaunchError::NotFound("/nonexistent/linguard-engine".to_string())
        );
    }

    #[tokio::test]
    async fn test_non_executable_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("linguard-noexec-{}", std::process::id()));
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = SubprocessLauncher::new()
            .spawn(&SubprocessSpec::new(&path))
            .await
            .unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, LaunchError::PermissionDenied(_)));
    }
}
