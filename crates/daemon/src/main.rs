//! Linguard - Main Entry Point
//! Engine supervisor + HTTP gateway

mod logging;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

// Import workspace crates
use linguard_api_http::error::ErrorContext;
use linguard_api_http::{ApiServer, AppState};
use linguard_core::application::{
    cancel_channel, HealthAggregator, ProbeLedger, ProcessSupervisor, ReadinessPoller,
    ResponseCache, TranslationGateway, TranslationService,
};
use linguard_core::port::{SystemTimeProvider, UuidProvider};
use linguard_infra_http::{HttpHealthEndpoint, ReqwestTransport};
use linguard_infra_system::{platform_service_control, SubprocessLauncher, SystemProbeImpl};

use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = logging::init()?;
    info!("Linguard v{} starting...", VERSION);

    // 2. Load configuration
    let (settings, config_path) = Settings::load()?;
    info!(config = ?config_path, "Configuration loaded");
    let engine = settings.engine.clone();
    engine.validate().context("Invalid engine configuration")?;

    // 3. Setup dependencies (DI wiring)
    let clock = Arc::new(SystemTimeProvider);
    let ledger = ProbeLedger::new();
    let health_endpoint = HttpHealthEndpoint::new(
        engine.endpoint(&engine.health_path),
        engine.probe_timeout(),
    )?;
    let poller = ReadinessPoller::new(
        Arc::new(health_endpoint),
        engine.readiness_interval(),
        engine.probe_timeout(),
        ledger.clone(),
        clock.clone(),
    );
    let supervisor = ProcessSupervisor::new(
        engine.clone(),
        platform_service_control(),
        Arc::new(SubprocessLauncher::new()),
        poller,
        clock.clone(),
    );

    let transport = ReqwestTransport::new(engine.base_url.clone(), engine.request_timeout())?;
    let gateway = TranslationGateway::new(Arc::new(transport), &engine);
    let cache = ResponseCache::from_config(&settings.cache);
    let translation = TranslationService::new(
        Arc::new(gateway),
        cache.clone(),
        supervisor.status_reader(),
        Duration::from_secs(settings.cache.languages_ttl_secs),
    );
    let health = HealthAggregator::new(
        supervisor.status_reader(),
        ledger,
        Arc::new(SystemProbeImpl::new()),
        clock.clone(),
        engine.freshness_window(),
        engine.base_url.clone(),
    );

    let (shutdown, shutdown_token) = cancel_channel();

    // 4. Cache sweeper
    let sweep_interval = Duration::from_secs(settings.cache.sweep_interval_secs.max(1));
    let sweeper_token = shutdown_token.clone();
    let sweeper = tokio::spawn(async move { cache.run_sweeper(sweep_interval, sweeper_token).await });

    // 5. Start HTTP server
    let state = AppState {
        translation: Arc::new(translation),
        supervisor: supervisor.clone(),
        health: Arc::new(health),
        shutdown: shutdown_token.clone(),
        started: Instant::now(),
    };
    let errors = ErrorContext {
        ids: Arc::new(UuidProvider),
        clock: clock.clone(),
    };
    let server = ApiServer::bind(&settings.server, state, errors)
        .await
        .with_context(|| {
            format!(
                "Failed to bind HTTP server on {}:{}",
                settings.server.host, settings.server.port
            )
        })?;
    let server_token = shutdown_token.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve(server_token).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // 6. Bring the engine up (failure is reported by /health; /engine/start retries)
    let starter = {
        let supervisor = supervisor.clone();
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            match supervisor.start(&token).await {
                Ok(status) => info!(state = %status.state, ownership = ?status.ownership, "Engine supervisor started"),
                Err(e) => error!(error = %e, kind = e.kind(), "Engine failed to start, serving in degraded mode"),
            }
        })
    };

    info!("System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    shutdown.cancel();
    if tokio::time::timeout(SERVER_DRAIN_TIMEOUT, server_handle)
        .await
        .is_err()
    {
        warn!("HTTP server did not drain in time");
    }
    let _ = starter.await;
    let status = supervisor.stop().await;
    let _ = sweeper.await;

    info!(state = %status.state, "Shutdown complete.");
    Ok(())
}

/// Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
