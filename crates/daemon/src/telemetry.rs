//! OpenTelemetry trace export (optional)
//!
//! Active when the daemon is built with `--features telemetry` and
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: linguard)
//!
//! ```text
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 \
//! OTEL_SERVICE_NAME=linguard-staging \
//!     ./linguard
//! ```

pub const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const SERVICE_NAME_VAR: &str = "OTEL_SERVICE_NAME";
pub const DEFAULT_SERVICE_NAME: &str = "linguard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub endpoint: String,
    pub service_name: String,
}

impl TelemetryConfig {
    /// `None` unless an OTLP endpoint is configured
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let endpoint = lookup(ENDPOINT_VAR).filter(|endpoint| !endpoint.trim().is_empty())?;
        let service_name = lookup(SERVICE_NAME_VAR)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        Some(Self {
            endpoint,
            service_name,
        })
    }
}

/// Installed OTLP pipeline; flushes pending spans when dropped
#[cfg(feature = "telemetry")]
pub struct Exporter {
    provider: opentelemetry_sdk::trace::TracerProvider,
    tracer: opentelemetry_sdk::trace::Tracer,
}

#[cfg(feature = "telemetry")]
impl Exporter {
    pub fn tracer(&self) -> opentelemetry_sdk::trace::Tracer {
        self.tracer.clone()
    }
}

#[cfg(feature = "telemetry")]
impl Drop for Exporter {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Failed to flush OpenTelemetry spans");
        }
    }
}

/// Build the OTLP span exporter with a batch processor on the tokio runtime.
///
/// Must be called from inside the runtime.
#[cfg(feature = "telemetry")]
pub fn install(config: &TelemetryConfig) -> anyhow::Result<Exporter> {
    use anyhow::Context;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, Resource};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.endpoint.clone())
        .build()
        .context("Failed to build OTLP span exporter")?;

    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(config.service_name.clone());

    Ok(Exporter { provider, tracer })
}
