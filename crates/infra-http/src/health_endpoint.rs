// Engine health endpoint over HTTP
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

use linguard_core::port::{HealthEndpoint, ProbeOutcome};
use linguard_core::{AppError, Result};

/// `GET <engine>/health`; any 2xx means ready.
///
/// Refused or reset connections are the normal "still starting" answer.
pub struct HttpHealthEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthEndpoint {
    /// # Errors
    /// - `Config` if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, probe_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("health probe HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HealthEndpoint for HttpHealthEndpoint {
    async fn check(&self) -> ProbeOutcome {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => {
                ProbeOutcome::ready(response.status().to_string())
            }
            Ok(response) => ProbeOutcome::not_ready(response.status().to_string()),
            Err(e) => {
                trace!(url = %self.url, error = %e, "Health probe failed");
                let detail = if e.is_timeout() {
                    "probe timed out".to_string()
                } else if e.is_connect() {
                    "connection refused".to_string()
                } else {
                    e.to_string()
                };
                ProbeOutcome::not_ready(detail)
            }
        }
    }

    fn target(&self) -> &str {
        &self.url
    }
}
