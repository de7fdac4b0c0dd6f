// Supervisor state cell (single writer, snapshot readers)

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use crate::application::constants::TRANSITION_CHANNEL_CAPACITY;
use crate::domain::{DomainError, LifecycleEvent, SupervisorState, SupervisorStatus};
use crate::port::TimeProvider;

/// A state change, as published on the transition stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: SupervisorState,
    pub to: SupervisorState,
    pub event: &'static str,
    pub at: DateTime<Utc>,
}

/// Read side handed to health checks and request handlers.
///
/// Every read returns a copy; nobody outside the supervisor can mutate state.
#[derive(Clone)]
pub struct StatusReader {
    rx: watch::Receiver<SupervisorStatus>,
}

impl StatusReader {
    pub fn current(&self) -> SupervisorStatus {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.rx.borrow().state
    }

    /// Wait until `predicate` holds for the current status, then return a copy
    pub async fn wait_for<F>(&self, mut predicate: F) -> SupervisorStatus
    where
        F: FnMut(&SupervisorStatus) -> bool,
    {
        let mut rx = self.rx.clone();
        let matched = match rx.wait_for(|status| predicate(status)).await {
            Ok(status) => Some(status.clone()),
            Err(_) => None,
        };
        matched.unwrap_or_else(|| self.current())
    }
}

pub(crate) struct StateCell {
    tx: watch::Sender<SupervisorStatus>,
    transitions: broadcast::Sender<Transition>,
    clock: Arc<dyn TimeProvider>,
}

impl StateCell {
    pub(crate) fn new(clock: Arc<dyn TimeProvider>) -> Self {
        let (tx, _rx) = watch::channel(SupervisorStatus::new(clock.now()));
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            tx,
            transitions,
            clock,
        }
    }

    pub(crate) fn reader(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn subscribe_transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    pub(crate) fn current(&self) -> SupervisorStatus {
        self.tx.borrow().clone()
    }

    /// Atomic check-and-set for Start(): moves to Starting if the current state
    /// accepts a start, otherwise returns the current status untouched.
    pub(crate) fn begin_start(&self) -> Result<SupervisorStatus, SupervisorStatus> {
        let mut began = false;
        let now = self.clock.now();
        let mut from = SupervisorState::NotStarted;
        self.tx.send_if_modified(|status| {
            if !status.state.accepts_start() {
                return false;
            }
            from = status.state;
            status.state = SupervisorState::Starting;
            status.last_transition = now;
            status.restart_attempts = 0;
            status.last_error = None;
            status.last_exit = None;
            began = true;
            true
        });

        let current = self.current();
        if began {
            self.publish(from, SupervisorState::Starting, &LifecycleEvent::StartRequested, now);
            Ok(current)
        } else {
            Err(current)
        }
    }

    /// Apply `event` through the state machine and update the bookkeeping
    /// fields that go with it. Invalid transitions are logged and ignored.
    pub(crate) fn apply(&self, event: LifecycleEvent) -> Result<SupervisorState, DomainError> {
        let now = self.clock.now();
        let mut outcome = None;
        self.tx.send_if_modified(|status| {
            let from = status.state;
            let next = match from.on(&event) {
                Ok(next) => next,
                Err(e) => {
                    outcome = Some(Err(e));
                    return false;
                }
            };
            status.state = next;
            status.last_transition = now;
            match &event {
                LifecycleEvent::ReadinessConfirmed => {
                    status.ready_since = Some(now);
                    status.last_error = None;
                }
                LifecycleEvent::StartupFailed { reason } => {
                    status.last_error = Some(reason.clone());
                    status.pid = None;
                    status.ownership = None;
                    status.ready_since = None;
                }
                LifecycleEvent::ProbeFailed { reason } => {
                    status.last_error = Some(reason.clone());
                }
                LifecycleEvent::ProcessExited(info) => {
                    status.last_exit = Some(*info);
                    status.pid = None;
                    status.ready_since = None;
                }
                LifecycleEvent::RestartScheduled { attempt } => {
                    status.restart_attempts = *attempt;
                    status.ready_since = None;
                }
                LifecycleEvent::AttemptsExhausted | LifecycleEvent::StopRequested => {
                    status.pid = None;
                    status.ownership = None;
                    status.ready_since = None;
                }
                LifecycleEvent::StartRequested | LifecycleEvent::ProbeRecovered => {}
            }
            outcome = Some(Ok((from, next)));
            true
        });

        match outcome {
            Some(Ok((from, to))) => {
                self.publish(from, to, &event, now);
                Ok(to)
            }
            Some(Err(e)) => {
                error!(error = %e, "Rejected supervisor transition");
                Err(e)
            }
            None => Err(DomainError::ValidationError(
                "state update closure did not run".to_string(),
            )),
        }
    }

    /// Update fields that do not change the lifecycle state (pid, ownership)
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut SupervisorStatus),
    {
        self.tx.send_modify(f);
    }

    fn publish(
        &self,
        from: SupervisorState,
        to: SupervisorState,
        event: &LifecycleEvent,
        at: DateTime<Utc>,
    ) {
        info!(from = %from, to = %to, event = event.name(), "Supervisor transition");
        // No subscribers is fine
        let _ = self.transitions.send(Transition {
            from,
            to,
            event: event.name(),
            at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitInfo;
    use crate::port::SystemTimeProvider;

    fn cell() -> StateCell {
        StateCell::new(Arc::new(SystemTimeProvider))
    }

    #[test]
    fn test_begin_start_is_check_and_set() {
        let cell = cell();
        let started = cell.begin_start().unwrap();
        assert_eq!(started.state, SupervisorState::Starting);

        // second caller observes Starting and does nothing
        let second = cell.begin_start().unwrap_err();
        assert_eq!(second.state, SupervisorState::Starting);
    }

    #[test]
    fn test_apply_tracks_bookkeeping() {
        let cell = cell();
        let reader = cell.reader();
        cell.begin_start().unwrap();
        cell.update(|s| s.pid = Some(4242));
        cell.apply(LifecycleEvent::ReadinessConfirmed).unwrap();
        assert!(reader.current().ready_since.is_some());
        assert_eq!(reader.current().pid, Some(4242));

        let exit = ExitInfo {
            code: Some(137),
            signal: None,
        };
        cell.apply(LifecycleEvent::ProcessExited(exit)).unwrap();
        let status = reader.current();
        assert_eq!(status.state, SupervisorState::Degraded);
        assert_eq!(status.last_exit, Some(exit));
        assert_eq!(status.pid, None);

        cell.apply(LifecycleEvent::RestartScheduled { attempt: 2 })
            .unwrap();
        assert_eq!(reader.current().restart_attempts, 2);
    }

    #[test]
    fn test_invalid_transition_leaves_state_untouched() {
        let cell = cell();
        let before = cell.current();
        assert!(cell.apply(LifecycleEvent::ReadinessConfirmed).is_err());
        assert_eq!(cell.current(), before);
    }

    #[tokio::test]
    async fn test_transitions_are_published_in_order() {
        let cell = cell();
        let mut events = cell.subscribe_transitions();
        cell.begin_start().unwrap();
        cell.apply(LifecycleEvent::ReadinessConfirmed).unwrap();
        cell.apply(LifecycleEvent::StopRequested).unwrap();

        let seen: Vec<_> = [
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|t| (t.from, t.to))
        .collect();
        assert_eq!(
            seen,
            vec![
                (SupervisorState::NotStarted, SupervisorState::Starting),
                (SupervisorState::Starting, SupervisorState::Ready),
                (SupervisorState::Ready, SupervisorState::Stopped),
            ]
        );
    }

    #[tokio::test]
    async fn test_reader_wait_for() {
        let cell = Arc::new(cell());
        let reader = cell.reader();
        let writer = cell.clone();
        tokio::spawn(async move {
            writer.begin_start().unwrap();
            writer.apply(LifecycleEvent::ReadinessConfirmed).unwrap();
        });
        let status = reader
            .wait_for(|s| s.state == SupervisorState::Ready)
            .await;
        assert_eq!(status.state, SupervisorState::Ready);
    }
}
