// Startup strategy cascade
//
// 1. managed service already running -> attach, verify readiness
// 2. start the managed service (bounded wait) -> verify readiness
// 3. spawn the configured executable -> verify readiness
// First success wins.

use std::future::Future;
use tracing::{debug, error, info, warn};

use super::{Backend, SupervisorInner};
use crate::application::cancel::CancelToken;
use crate::application::constants::SERVICE_CONTROL_GRACE;
use crate::application::readiness::ReadinessError;
use crate::domain::SubprocessSpec;
use crate::error::{AppError, Result};
use crate::port::ServiceControlError;

fn cancelled() -> AppError {
    AppError::Cancelled("engine start cancelled".to_string())
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<F: Future>(cancel: &CancelToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => Err(cancelled()),
        out = fut => Ok(out),
    }
}

impl SupervisorInner {
    pub(super) async fn launch(&self, cancel: &CancelToken) -> Result<Backend> {
        if let Some(service) = &self.config.managed_service {
            if let Some(backend) = self.try_managed_service(service, cancel).await? {
                return Ok(backend);
            }
        }

        match &self.config.subprocess {
            Some(spec) => self.spawn_subprocess(spec, cancel).await,
            None => Err(AppError::ProcessLaunch(
                "managed service could not be started and no subprocess is configured"
                    .to_string(),
            )),
        }
    }

    /// Strategies 1 and 2. `Ok(None)` means "fall through to the subprocess".
    async fn try_managed_service(
        &self,
        service: &str,
        cancel: &CancelToken,
    ) -> Result<Option<Backend>> {
        let running = match cancellable(cancel, self.probe.is_running(service)).await? {
            Ok(running) => running,
            Err(e) => {
                warn!(service, error = %e, "Service state query failed, assuming not running");
                false
            }
        };

        if running {
            // Someone else started it; never spawn a second engine next to it
            info!(service, "Managed service already running, attaching");
            self.verify_readiness(cancel).await?;
            return Ok(Some(Backend::Attached {
                service: service.to_string(),
            }));
        }

        info!(service, wait_secs = self.config.service_start_wait_secs, "Starting managed service");
        let started = tokio::select! {
            _ = cancel.cancelled() => {
                // The start request may still land; undo it
                self.stop_service(service).await;
                return Err(cancelled());
            }
            started = self.bounded_service_call(service, true) => started,
        };
        if let Err(e) = started {
            warn!(service, error = %e, "Managed service start failed");
            if matches!(e, ServiceControlError::Timeout { .. }) {
                // May still come up later; never leave it next to a subprocess
                self.stop_service(service).await;
            }
            return Ok(None);
        }

        match self.verify_readiness(cancel).await {
            Ok(()) => Ok(Some(Backend::ManagedService {
                service: service.to_string(),
            })),
            Err(e) => {
                self.stop_service(service).await;
                match e {
                    AppError::StartupTimeout { .. } if self.config.subprocess.is_some() => {
                        warn!(service, "Managed service never became ready, falling back to subprocess");
                        Ok(None)
                    }
                    e => Err(e),
                }
            }
        }
    }

    /// Strategy 3
    async fn spawn_subprocess(&self, spec: &SubprocessSpec, cancel: &CancelToken) -> Result<Backend> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let child = self.launcher.spawn(spec).await.map_err(|e| {
            error!(command = %spec.display(), error = %e, "Engine process launch failed");
            AppError::ProcessLaunch(e.to_string())
        })?;
        info!(pid = child.pid(), command = %spec.display(), "Engine process spawned");
        let pid = child.pid();
        self.state.update(|status| status.pid = Some(pid));

        let verified = tokio::select! {
            verified = self.verify_readiness(cancel) => verified,
            exit = child.exited() => {
                error!(pid, exit = %exit, "Engine process exited during startup");
                Err(AppError::EngineExited(exit.to_string()))
            }
        };

        match verified {
            Ok(()) => Ok(Backend::Subprocess(child)),
            Err(e) => {
                self.release(Backend::Subprocess(child)).await;
                self.state.update(|status| status.pid = None);
                Err(e)
            }
        }
    }

    async fn verify_readiness(&self, cancel: &CancelToken) -> Result<()> {
        let timeout = self.config.startup_timeout();
        match self.poller.wait_until_ready(timeout, cancel).await {
            Ok(record) => {
                debug!(
                    endpoint = %self.poller.target(),
                    latency_ms = record.latency.as_millis() as u64,
                    "Readiness verified"
                );
                Ok(())
            }
            Err(ReadinessError::Timeout {
                attempts,
                last_detail,
                ..
            }) => {
                error!(
                    endpoint = %self.poller.target(),
                    timeout_secs = timeout.as_secs(),
                    attempts,
                    last = ?last_detail,
                    "Engine did not become ready"
                );
                Err(AppError::StartupTimeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
            Err(ReadinessError::Cancelled) => Err(cancelled()),
        }
    }

    /// Best-effort teardown of a backend; never fails
    pub(super) async fn release(&self, backend: Backend) {
        match backend {
            Backend::Subprocess(child) => {
                if let Some(exit) = child.exit_info() {
                    debug!(pid = child.pid(), exit = %exit, "Engine process already exited");
                    return;
                }
                match self
                    .launcher
                    .terminate(&child, self.config.stop_timeout())
                    .await
                {
                    Ok(exit) => info!(pid = child.pid(), exit = %exit, "Engine process terminated"),
                    Err(e) => warn!(pid = child.pid(), error = %e, "Failed to terminate engine process"),
                }
            }
            Backend::ManagedService { service } => self.stop_service(&service).await,
            Backend::Attached { service } => {
                if self.config.release_attached_service {
                    self.stop_service(&service).await;
                } else {
                    info!(service, "Leaving attached service running");
                }
            }
        }
    }

    async fn stop_service(&self, service: &str) {
        match self.bounded_service_call(service, false).await {
            Ok(()) => info!(service, "Managed service stopped"),
            Err(e) => warn!(service, error = %e, "Failed to stop managed service"),
        }
    }

    /// Service start/stop with a hard bound, whatever the adapter does
    async fn bounded_service_call(
        &self,
        service: &str,
        start: bool,
    ) -> std::result::Result<(), ServiceControlError> {
        let wait = self.config.service_start_wait();
        let call = async {
            if start {
                self.probe.start(service, wait).await
            } else {
                self.probe.stop(service, wait).await
            }
        };
        match tokio::time::timeout(wait + SERVICE_CONTROL_GRACE, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceControlError::Timeout {
                service: service.to_string(),
                target: if start { "running" } else { "stopped" },
                waited: wait + SERVICE_CONTROL_GRACE,
            }),
        }
    }
}
