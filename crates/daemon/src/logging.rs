//! Logging initialisation
//!
//! - `RUST_LOG` filter, default `linguard=info,tower_http=info`
//! - `LINGUARD_LOG_FORMAT=json|pretty` for stdout
//! - `LINGUARD_LOG_DIR` adds a daily-rolling JSON file
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` exports spans (`telemetry` feature)

use anyhow::{Context, Result};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::telemetry::TelemetryConfig;

const DEFAULT_FILTER: &str = "linguard=info,tower_http=info";
const LOG_FILE_PREFIX: &str = "linguard.log";

/// Keeps the file writer and span exporter alive; dropping it flushes both.
pub struct LoggingGuard {
    #[cfg(feature = "telemetry")]
    _exporter: Option<crate::telemetry::Exporter>,
    _file_guard: Option<WorkerGuard>,
}

pub fn init() -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let json = std::env::var("LINGUARD_LOG_FORMAT").is_ok_and(|format| format == "json");
    let stdout_layer = if json {
        // Production: JSON structured logging
        fmt::layer().json().boxed()
    } else {
        fmt::layer().pretty().boxed()
    };

    let (file_layer, file_guard) = match std::env::var_os("LINGUARD_LOG_DIR") {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let telemetry = TelemetryConfig::from_env();
    // Exporter failures are reported once the subscriber is up
    #[cfg(feature = "telemetry")]
    let (exporter, export_error) = match telemetry
        .as_ref()
        .map(crate::telemetry::install)
        .transpose()
    {
        Ok(exporter) => (exporter, None),
        Err(e) => (None, Some(e)),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);
    #[cfg(feature = "telemetry")]
    let subscriber = subscriber.with(
        exporter
            .as_ref()
            .map(|exporter| tracing_opentelemetry::layer().with_tracer(exporter.tracer())),
    );
    subscriber
        .try_init()
        .context("Failed to install tracing subscriber")?;

    #[cfg(feature = "telemetry")]
    {
        match (&telemetry, &export_error) {
            (_, Some(e)) => {
                warn!(error = %e, "Failed to initialize OpenTelemetry (continuing without it)")
            }
            (Some(config), None) => tracing::info!(
                service_name = %config.service_name,
                endpoint = %config.endpoint,
                "OpenTelemetry span export enabled"
            ),
            (None, None) => {}
        }
    }
    #[cfg(not(feature = "telemetry"))]
    {
        if let Some(config) = &telemetry {
            warn!(
                endpoint = %config.endpoint,
                "OTLP endpoint set but the daemon was built without the 'telemetry' feature"
            );
        }
    }

    Ok(LoggingGuard {
        #[cfg(feature = "telemetry")]
        _exporter: exporter,
        _file_guard: file_guard,
    })
}
