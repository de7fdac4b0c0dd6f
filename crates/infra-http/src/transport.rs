// Engine transport over reqwest
// reason: reqwest (rustls) for the engine's HTTP surface (ADR-002)
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

use linguard_core::port::{EngineReply, EngineTransport, TransportError};
use linguard_core::{AppError, Result};

/// Moves bytes between the gateway and the engine. No retries; the
/// supervisor and callers decide what a failure means.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport
    ///
    /// # Arguments
    /// * `base_url` - Engine base URL, e.g. `http://127.0.0.1:5001`
    /// * `timeout` - Upper bound for a whole request/response exchange
    ///
    /// # Errors
    /// - `Config` if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("engine HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }

    async fn read(&self, response: reqwest::Response) -> std::result::Result<EngineReply, TransportError> {
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        trace!(status, bytes = body.len(), "Engine replied");
        Ok(EngineReply {
            status,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl EngineTransport for ReqwestTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<EngineReply, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        self.read(response).await
    }

    async fn get(&self, path: &str) -> std::result::Result<EngineReply, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        self.read(response).await
    }
}
