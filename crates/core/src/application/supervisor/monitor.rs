// Engine monitor loop
//
// Watches the child exit signal (subprocess ownership) and runs periodic
// liveness probes. Crashes and sustained probe failures go through the
// restart policy; exhaustion ends in Failed and stops monitoring.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::SupervisorInner;
use crate::application::cancel::CancelToken;
use crate::application::restart::RestartDecision;
use crate::domain::{ExitInfo, LifecycleEvent, SupervisorState};
use crate::error::AppError;
use crate::port::ChildHandle;

enum Trigger {
    Exited(ExitInfo),
    Unresponsive { failures: u32 },
}

enum Recovery {
    /// Engine is Ready again; keep monitoring
    Resumed,
    /// Failed, stopped or cancelled; the monitor ends
    Finished,
}

pub(super) fn spawn(
    inner: Arc<SupervisorInner>,
    child: Option<ChildHandle>,
    cancel: CancelToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        Monitor {
            inner,
            child,
            cancel,
            consecutive_failures: 0,
            ready_since: Instant::now(),
        }
        .run()
        .await
    })
}

struct Monitor {
    inner: Arc<SupervisorInner>,
    child: Option<ChildHandle>,
    cancel: CancelToken,
    consecutive_failures: u32,
    ready_since: Instant,
}

impl Monitor {
    async fn run(mut self) {
        let period = self.inner.config.monitor_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(pid = ?self.child.as_ref().map(ChildHandle::pid), "Engine monitor started");

        loop {
            let child = self.child.clone();
            let exited = async move {
                match child {
                    Some(child) => child.exited().await,
                    None => std::future::pending().await,
                }
            };

            let trigger = tokio::select! {
                _ = self.cancel.cancelled() => break,
                exit = exited => Some(Trigger::Exited(exit)),
                _ = ticker.tick() => None,
            };
            let trigger = match trigger {
                Some(trigger) => trigger,
                None => match self.liveness_probe().await {
                    Some(trigger) => trigger,
                    None => continue,
                },
            };

            if self.cancel.is_cancelled() {
                break;
            }
            match self.recover(trigger).await {
                Recovery::Resumed => ticker.reset(),
                Recovery::Finished => break,
            }
        }
        debug!("Engine monitor stopped");
    }

    /// One periodic probe; returns a trigger once failures reach the threshold
    async fn liveness_probe(&mut self) -> Option<Trigger> {
        let record = self.inner.poller.probe_once().await;
        if self.cancel.is_cancelled() {
            return None;
        }
        let state = self.inner.state.current().state;

        if record.success {
            if self.consecutive_failures > 0 {
                info!(after_failures = self.consecutive_failures, "Engine probe recovered");
            }
            self.consecutive_failures = 0;
            if state == SupervisorState::Degraded {
                let _ = self.inner.state.apply(LifecycleEvent::ProbeRecovered);
            }
            return None;
        }

        self.consecutive_failures += 1;
        let reason = record
            .detail
            .unwrap_or_else(|| "health probe failed".to_string());
        warn!(
            failures = self.consecutive_failures,
            threshold = self.inner.config.unhealthy_threshold,
            reason = %reason,
            "Engine liveness probe failed"
        );
        if state == SupervisorState::Ready {
            let _ = self.inner.state.apply(LifecycleEvent::ProbeFailed { reason });
        }

        (self.consecutive_failures >= self.inner.config.unhealthy_threshold.max(1)).then_some(
            Trigger::Unresponsive {
                failures: self.consecutive_failures,
            },
        )
    }

    async fn recover(&mut self, trigger: Trigger) -> Recovery {
        let inner = self.inner.clone();
        let policy = &inner.config.restart;

        match trigger {
            Trigger::Exited(exit) => {
                warn!(pid = ?self.child.as_ref().map(ChildHandle::pid), exit = %exit, "Engine process exited unexpectedly");
                let _ = inner.state.apply(LifecycleEvent::ProcessExited(exit));
            }
            Trigger::Unresponsive { failures } => {
                error!(failures, "Engine unresponsive, treating as crashed");
            }
        }
        self.child = None;

        let healthy_for = self.ready_since.elapsed();
        if policy.should_reset(healthy_for) && inner.state.current().restart_attempts > 0 {
            info!(healthy_secs = healthy_for.as_secs(), "Engine was stable, restart attempts reset");
            inner.state.update(|status| status.restart_attempts = 0);
        }

        loop {
            let attempts = inner.state.current().restart_attempts;
            let (attempt, delay) = match policy.decide(attempts) {
                RestartDecision::Restart { attempt, delay } => (attempt, delay),
                RestartDecision::Exhausted { attempts } => {
                    error!(attempts, "Engine restart attempts exhausted, manual intervention required");
                    self.give_up().await;
                    return Recovery::Finished;
                }
                RestartDecision::Disabled => {
                    warn!("Auto-restart disabled, engine left down");
                    self.give_up().await;
                    return Recovery::Finished;
                }
            };

            let _ = inner.state.apply(LifecycleEvent::RestartScheduled { attempt });
            info!(attempt, max_attempts = policy.max_attempts, delay_secs = delay.as_secs(), "Restarting engine");

            match self.restart_once(delay).await {
                Ok(()) => {
                    info!(attempt, "Engine recovered");
                    return Recovery::Resumed;
                }
                Err(AppError::Cancelled(_)) => return Recovery::Finished,
                Err(e @ AppError::ProcessLaunch(_)) => {
                    error!(attempt, error = %e, "Engine cannot be launched, not retrying");
                    let _ = inner.state.apply(LifecycleEvent::StartupFailed {
                        reason: e.to_string(),
                    });
                    return Recovery::Finished;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Restart attempt failed");
                    inner
                        .state
                        .update(|status| status.last_error = Some(e.to_string()));
                }
            }
        }
    }

    /// Wait out the backoff, tear down the old backend, run the cascade again
    async fn restart_once(&mut self, delay: Duration) -> Result<(), AppError> {
        let cancelled = || AppError::Cancelled("restart cancelled".to_string());
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(delay) => {}
        }
        let inner = self.inner.clone();
        let mut control = tokio::select! {
            _ = self.cancel.cancelled() => return Err(cancelled()),
            control = inner.control.lock() => control,
        };
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        if let Some(old) = control.backend.take() {
            inner.release(old).await;
        }
        inner.state.update(|status| {
            status.pid = None;
            status.ownership = None;
        });

        let backend = inner.launch(&self.cancel).await?;
        if self.cancel.is_cancelled() {
            inner.release(backend).await;
            return Err(cancelled());
        }

        inner.publish_backend(&backend);
        if let Err(e) = inner.state.apply(LifecycleEvent::ReadinessConfirmed) {
            warn!(error = %e, "Engine came back after the supervisor moved on, releasing it");
            inner.release(backend).await;
            inner.state.update(|status| {
                status.pid = None;
                status.ownership = None;
            });
            return Err(e.into());
        }
        self.child = backend.child().cloned();
        control.backend = Some(backend);
        self.consecutive_failures = 0;
        self.ready_since = Instant::now();
        Ok(())
    }

    /// Move to Failed and release whatever is left of the backend
    async fn give_up(&mut self) {
        let inner = self.inner.clone();
        let _ = inner.state.apply(LifecycleEvent::AttemptsExhausted);
        let leftover = tokio::select! {
            _ = self.cancel.cancelled() => None,
            mut control = inner.control.lock() => control.backend.take(),
        };
        if let Some(backend) = leftover {
            inner.release(backend).await;
        }
    }
}
