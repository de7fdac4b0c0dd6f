// Process Launcher Port
// Spawns the engine as a child process and terminates it (graceful, then forced)

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::{ExitInfo, SubprocessSpec};

/// Launcher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Signal delivery failed: {0}")]
    SignalFailed(String),
}

/// Sending half of a child's exit notification, held by whoever reaps the child
#[derive(Debug)]
pub struct ExitReporter {
    tx: watch::Sender<Option<ExitInfo>>,
}

impl ExitReporter {
    /// Publish the exit status. Only the first report is kept.
    pub fn report(&self, info: ExitInfo) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(info);
                true
            } else {
                false
            }
        });
    }
}

/// Handle to a spawned engine process.
///
/// Cloneable; every clone observes the same exit notification.
#[derive(Debug, Clone)]
pub struct ChildHandle {
    pid: u32,
    exit: watch::Receiver<Option<ExitInfo>>,
}

impl ChildHandle {
    /// Create a handle plus the reporter used to signal its exit
    pub fn channel(pid: u32) -> (ExitReporter, ChildHandle) {
        let (tx, exit) = watch::channel(None);
        (ExitReporter { tx }, ChildHandle { pid, exit })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status if the child has already exited
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_info().is_some()
    }

    /// Wait for the child to exit.
    ///
    /// If the reaper disappears without reporting, an unknown status is returned.
    pub async fn exited(&self) -> ExitInfo {
        let mut rx = self.exit.clone();
        let info = match rx.wait_for(Option::is_some).await {
            Ok(current) => *current,
            Err(_) => None,
        };
        info.unwrap_or_default()
    }
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the engine, piping its output into the logger.
    ///
    /// # Errors
    /// - LaunchError::NotFound / PermissionDenied if the program cannot run
    async fn spawn(&self, spec: &SubprocessSpec) -> Result<ChildHandle, LaunchError>;

    /// Ask the child to exit, force-kill after `grace`, return its exit status
    async fn terminate(
        &self,
        child: &ChildHandle,
        grace: Duration,
    ) -> Result<ExitInfo, LaunchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const SIGTERM: i32 = 15;

    #[derive(Default)]
    struct LauncherState {
        next_pid: u32,
        children: Vec<(ChildHandle, ExitReporter)>,
        failures: VecDeque<LaunchError>,
        exit_immediately: Option<ExitInfo>,
        terminated: Vec<u32>,
        spawned_specs: Vec<SubprocessSpec>,
    }

    /// Launcher that hands out fake children whose exit is controlled by the test
    #[derive(Default)]
    pub struct FakeProcessLauncher {
        state: Mutex<LauncherState>,
    }

    impl FakeProcessLauncher {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(LauncherState {
                    next_pid: 1000,
                    ..Default::default()
                }),
            }
        }

        /// Next spawn fails with `err`
        pub fn fail_next(&self, err: LaunchError) {
            self.state.lock().unwrap().failures.push_back(err);
        }

        /// Every spawned child exits right away with `info`
        pub fn exit_immediately(&self, info: Option<ExitInfo>) {
            self.state.lock().unwrap().exit_immediately = info;
        }

        pub fn spawn_count(&self) -> usize {
            self.state.lock().unwrap().children.len()
        }

        pub fn spawned_specs(&self) -> Vec<SubprocessSpec> {
            self.state.lock().unwrap().spawned_specs.clone()
        }

        /// PIDs of children that have not exited
        pub fn live_pids(&self) -> Vec<u32> {
            self.state
                .lock()
                .unwrap()
                .children
                .iter()
                .filter(|(child, _)| !child.has_exited())
                .map(|(child, _)| child.pid())
                .collect()
        }

        pub fn terminated(&self) -> Vec<u32> {
            self.state.lock().unwrap().terminated.clone()
        }

        /// Simulate an unexpected exit of the most recent live child
        pub fn crash_latest(&self, code: i32) -> Option<u32> {
            let state = self.state.lock().unwrap();
            let (child, reporter) = state
                .children
                .iter()
                .rev()
                .find(|(child, _)| !child.has_exited())?;
            reporter.report(ExitInfo {
                code: Some(code),
                signal: None,
            });
            Some(child.pid())
        }
    }

    #[async_trait]
    impl ProcessLauncher for FakeProcessLauncher {
        async fn spawn(&self, spec: &SubprocessSpec) -> Result<ChildHandle, LaunchError> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.failures.pop_front() {
                return Err(err);
            }
            state.next_pid += 1;
            let (reporter, child) = ChildHandle::channel(state.next_pid);
            if let Some(info) = state.exit_immediately {
                reporter.report(info);
            }
            state.spawned_specs.push(spec.clone());
            state.children.push((child.clone(), reporter));
            Ok(child)
        }

        async fn terminate(
            &self,
            child: &ChildHandle,
            _grace: Duration,
        ) -> Result<ExitInfo, LaunchError> {
            let mut state = self.state.lock().unwrap();
            state.terminated.push(child.pid());
            if let Some((_, reporter)) = state
                .children
                .iter()
                .find(|(known, _)| known.pid() == child.pid())
            {
                reporter.report(ExitInfo {
                    code: None,
                    signal: Some(SIGTERM),
                });
            }
            Ok(child.exit_info().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exit_notification_reaches_all_clones() {
        let (reporter, child) = ChildHandle::channel(42);
        let other = child.clone();
        assert!(!child.has_exited());

        let waiter = tokio::spawn(async move { other.exited().await });
        reporter.report(ExitInfo {
            code: Some(3),
            signal: None,
        });
        // Second report is ignored
        reporter.report(ExitInfo {
            code: Some(9),
            signal: None,
        });

        assert_eq!(waiter.await.unwrap().code, Some(3));
        assert_eq!(child.exit_info().and_then(|e| e.code), Some(3));
    }

    #[tokio::test]
    async fn test_dropped_reporter_yields_unknown_exit() {
        let (reporter, child) = ChildHandle::channel(7);
        drop(reporter);
        assert_eq!(child.exited().await, ExitInfo::default());
    }
}
