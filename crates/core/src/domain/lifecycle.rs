// Supervisor Lifecycle (state machine)
//
// Transitions are a pure function of (state, event) so they can be tested
// without spawning processes. The supervisor is the only writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Engine supervisor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorState {
    NotStarted,
    Starting,
    Ready,
    Degraded,
    Restarting,
    Stopped,
    Failed,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::NotStarted => write!(f, "NOT_STARTED"),
            SupervisorState::Starting => write!(f, "STARTING"),
            SupervisorState::Ready => write!(f, "READY"),
            SupervisorState::Degraded => write!(f, "DEGRADED"),
            SupervisorState::Restarting => write!(f, "RESTARTING"),
            SupervisorState::Stopped => write!(f, "STOPPED"),
            SupervisorState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Discrete events that drive the supervisor state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    StartRequested,
    ReadinessConfirmed,
    StartupFailed { reason: String },
    ProbeFailed { reason: String },
    ProbeRecovered,
    ProcessExited(ExitInfo),
    RestartScheduled { attempt: u32 },
    AttemptsExhausted,
    StopRequested,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::StartRequested => "START_REQUESTED",
            LifecycleEvent::ReadinessConfirmed => "READINESS_CONFIRMED",
            LifecycleEvent::StartupFailed { .. } => "STARTUP_FAILED",
            LifecycleEvent::ProbeFailed { .. } => "PROBE_FAILED",
            LifecycleEvent::ProbeRecovered => "PROBE_RECOVERED",
            LifecycleEvent::ProcessExited(_) => "PROCESS_EXITED",
            LifecycleEvent::RestartScheduled { .. } => "RESTART_SCHEDULED",
            LifecycleEvent::AttemptsExhausted => "ATTEMPTS_EXHAUSTED",
            LifecycleEvent::StopRequested => "STOP_REQUESTED",
        }
    }
}

impl SupervisorState {
    /// Compute the next state for `event`, or reject the transition.
    pub fn on(self, event: &LifecycleEvent) -> Result<SupervisorState> {
        use LifecycleEvent as E;
        use SupervisorState as S;

        let next = match (self, event) {
            (_, E::StopRequested) => S::Stopped,

            (S::NotStarted | S::Stopped | S::Failed, E::StartRequested) => S::Starting,

            // Ready is only ever reached through a successful readiness check
            (S::Starting | S::Restarting, E::ReadinessConfirmed) => S::Ready,
            (S::Starting | S::Restarting, E::StartupFailed { .. }) => S::Failed,

            (S::Ready | S::Degraded, E::ProbeFailed { .. }) => S::Degraded,
            (S::Ready | S::Degraded, E::ProcessExited(_)) => S::Degraded,
            (S::Degraded, E::ProbeRecovered) => S::Ready,

            (S::Degraded | S::Restarting, E::RestartScheduled { .. }) => S::Restarting,
            (S::Degraded | S::Restarting, E::AttemptsExhausted) => S::Failed,

            (from, event) => {
                return Err(DomainError::InvalidStateTransition {
                    from: from.to_string(),
                    event: event.name().to_string(),
                })
            }
        };
        Ok(next)
    }

    /// States from which `Start()` actually launches something
    pub fn accepts_start(self) -> bool {
        matches!(
            self,
            SupervisorState::NotStarted | SupervisorState::Stopped | SupervisorState::Failed
        )
    }

    /// States in which the monitor loop is active
    pub fn is_monitored(self) -> bool {
        matches!(self, SupervisorState::Ready | SupervisorState::Degraded)
    }
}

/// How the engine process exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Terminating signal (Unix only)
    pub signal: Option<i32>,
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(sig)) => write!(f, "signal {}", sig),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Which startup strategy produced the current backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OwnershipKind {
    /// Managed service that was already running; someone else owns it
    Attached { service: String },
    /// Managed service started by us
    ManagedService { service: String },
    /// Child process spawned by us
    Subprocess { pid: u32 },
}

/// Read-only copy of the supervisor's state, handed out to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub pid: Option<u32>,
    pub ownership: Option<OwnershipKind>,
    pub restart_attempts: u32,
    pub last_transition: DateTime<Utc>,
    pub ready_since: Option<DateTime<Utc>>,
    pub last_exit: Option<ExitInfo>,
    pub last_error: Option<String>,
}

impl SupervisorStatus {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: SupervisorState::NotStarted,
            pid: None,
            ownership: None,
            restart_attempts: 0,
            last_transition: now,
            ready_since: None,
            last_exit: None,
            last_error: None,
        }
    }
}
