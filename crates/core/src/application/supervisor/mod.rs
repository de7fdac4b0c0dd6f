// Process Supervisor
//
// Owns the engine backend (attached service, started service or child process),
// drives the lifecycle state machine and runs exactly one monitor task while
// the engine is Ready/Degraded.

mod launch;
mod monitor;
mod state;

pub use state::{StatusReader, Transition};

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::cancel::{CancelSource, CancelToken};
use crate::application::constants::MONITOR_JOIN_TIMEOUT;
use crate::application::readiness::ReadinessPoller;
use crate::domain::{
    EngineConfig, LifecycleEvent, OwnershipKind, SupervisorState, SupervisorStatus,
};
use crate::error::{AppError, Result};
use crate::port::{ChildHandle, ProcessLauncher, ProcessProbe, TimeProvider};
pub(crate) use state::StateCell;

/// What the supervisor currently considers "the" engine
pub(crate) enum Backend {
    Attached { service: String },
    ManagedService { service: String },
    Subprocess(ChildHandle),
}

impl Backend {
    fn kind(&self) -> OwnershipKind {
        match self {
            Backend::Attached { service } => OwnershipKind::Attached {
                service: service.clone(),
            },
            Backend::ManagedService { service } => OwnershipKind::ManagedService {
                service: service.clone(),
            },
            Backend::Subprocess(child) => OwnershipKind::Subprocess { pid: child.pid() },
        }
    }

    fn child(&self) -> Option<&ChildHandle> {
        match self {
            Backend::Subprocess(child) => Some(child),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Control {
    backend: Option<Backend>,
    monitor: Option<JoinHandle<()>>,
}

pub(crate) struct SupervisorInner {
    config: EngineConfig,
    probe: Arc<dyn ProcessProbe>,
    launcher: Arc<dyn ProcessLauncher>,
    poller: ReadinessPoller,
    state: StateCell,
    /// Serializes Start, Stop and restarts
    control: tokio::sync::Mutex<Control>,
    /// Cancels the current run (in-progress start, monitor, restart)
    run: Mutex<Option<CancelSource>>,
}

impl SupervisorInner {
    fn cancel_run(&self) {
        if let Ok(run) = self.run.lock() {
            if let Some(source) = run.as_ref() {
                source.cancel();
            }
        }
    }

    fn new_run(&self) -> CancelToken {
        let source = CancelSource::new();
        let token = source.token();
        if let Ok(mut run) = self.run.lock() {
            if let Some(previous) = run.replace(source) {
                previous.cancel();
            }
        }
        token
    }

    /// Start body; always leaves the state machine out of Starting
    async fn run_start(
        self: Arc<Self>,
        token: CancelToken,
        run: CancelToken,
    ) -> Result<SupervisorStatus> {
        let mut control = self.control.lock().await;

        let launched = if self.state.current().state != SupervisorState::Starting {
            // Stop() won the race for the control lock
            Err(AppError::Cancelled("start superseded by stop".to_string()))
        } else {
            self.launch(&token).await
        };
        let launched = match launched {
            Ok(backend) if token.is_cancelled() => {
                self.release(backend).await;
                Err(AppError::Cancelled("start cancelled".to_string()))
            }
            other => other,
        };

        match launched {
            Ok(backend) => {
                self.publish_backend(&backend);
                if let Err(e) = self.state.apply(LifecycleEvent::ReadinessConfirmed) {
                    warn!(error = %e, "Engine came up after the supervisor moved on, releasing it");
                    self.release(backend).await;
                    self.state.update(|status| {
                        status.pid = None;
                        status.ownership = None;
                    });
                    return Err(e.into());
                }
                let monitor = monitor::spawn(self.clone(), backend.child().cloned(), run);
                control.backend = Some(backend);
                control.monitor = Some(monitor);
                let status = self.state.current();
                info!(ownership = ?status.ownership, pid = ?status.pid, "Engine ready");
                Ok(status)
            }
            Err(e @ AppError::Cancelled(_)) => {
                warn!("Engine start cancelled");
                let _ = self.state.apply(LifecycleEvent::StopRequested);
                Err(e)
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Engine start failed");
                let _ = self.state.apply(LifecycleEvent::StartupFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Record the backend in the published status
    fn publish_backend(&self, backend: &Backend) {
        let kind = backend.kind();
        let pid = backend.child().map(ChildHandle::pid);
        self.state.update(|status| {
            status.ownership = Some(kind);
            status.pid = pid;
        });
    }
}

/// Supervises the translation engine process.
///
/// Cloning is cheap; clones control the same engine.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ProcessSupervisor {
    /// Create a supervisor
    ///
    /// # Arguments
    /// * `config` - Engine configuration (read-only from here on)
    /// * `probe` - Service control for the managed-service strategies
    /// * `launcher` - Child process launcher for the subprocess strategy
    /// * `poller` - Readiness poller against the engine health endpoint
    /// * `clock` - Timestamps for status and transitions
    pub fn new(
        config: EngineConfig,
        probe: Arc<dyn ProcessProbe>,
        launcher: Arc<dyn ProcessLauncher>,
        poller: ReadinessPoller,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                probe,
                launcher,
                poller,
                state: StateCell::new(clock),
                control: tokio::sync::Mutex::new(Control::default()),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Copy of the current status
    pub fn status(&self) -> SupervisorStatus {
        self.inner.state.current()
    }

    pub fn status_reader(&self) -> StatusReader {
        self.inner.state.reader()
    }

    /// Stream of state transitions (lagging subscribers drop old events)
    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.inner.state.subscribe_transitions()
    }

    /// Bring the engine up.
    ///
    /// No-op returning the current status unless the supervisor is
    /// NotStarted, Stopped or Failed. Cancelling `cancel` aborts the start and
    /// cleans up anything already launched.
    ///
    /// # Errors
    /// - `StartupTimeout` if the engine never became ready
    /// - `ProcessLaunch` if no strategy could launch the engine
    /// - `EngineExited` if the child died during readiness verification
    /// - `Cancelled` if `cancel` fired or Stop() was called meanwhile
    pub async fn start(&self, cancel: &CancelToken) -> Result<SupervisorStatus> {
        let inner = &self.inner;
        if let Err(current) = inner.state.begin_start() {
            debug!(state = %current.state, "Start ignored, supervisor already active");
            return Ok(current);
        }

        let run = inner.new_run();
        let token = cancel.joined(&run);
        // Runs detached: a dropped caller must not leave the supervisor in Starting
        let task = tokio::spawn(inner.clone().run_start(token, run));
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Engine start task failed");
                let reason = format!("engine start task failed: {e}");
                let _ = inner.state.apply(LifecycleEvent::StartupFailed {
                    reason: reason.clone(),
                });
                Err(AppError::Internal(reason))
            }
        }
    }

    /// Shut the engine down. Idempotent and infallible: errors are logged and
    /// the supervisor always ends in Stopped.
    pub async fn stop(&self) -> SupervisorStatus {
        let inner = &self.inner;
        inner.cancel_run();
        let mut control = inner.control.lock().await;
        // A start that registered its run after the first cancel
        inner.cancel_run();

        if let Some(mut monitor) = control.monitor.take() {
            if tokio::time::timeout(MONITOR_JOIN_TIMEOUT, &mut monitor)
                .await
                .is_err()
            {
                warn!("Engine monitor did not stop in time, aborting it");
                monitor.abort();
            }
        }

        if let Some(backend) = control.backend.take() {
            inner.release(backend).await;
        }

        let _ = inner.state.apply(LifecycleEvent::StopRequested);
        info!("Engine supervisor stopped");
        inner.state.current()
    }
}
