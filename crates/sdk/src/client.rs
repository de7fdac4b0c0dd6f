//! Linguard Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    EngineStatus, ErrorBody, HealthResponse, InfoResponse, LanguagesResponse, MetricsResponse,
    StatsResponse, TranslateRequest, TranslateResponse, VersionResponse,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Linguard HTTP API Client
///
/// # Example
///
/// ```no_run
/// use linguard_sdk::LinguardClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = LinguardClient::new("http://127.0.0.1:8080")?;
/// let health = client.health().await?;
/// println!("{}", health.status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LinguardClient {
    http: reqwest::Client,
    base_url: String,
}

impl LinguardClient {
    /// Create a client for the API at `url` (e.g. `http://127.0.0.1:8080`)
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SdkError::InvalidUrl(url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            http,
            base_url: url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Translate `text` from `source_lang` to `target_lang`
    pub async fn translate(
        &self,
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Result<TranslateResponse> {
        let body = TranslateRequest {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        };
        let response = self
            .http
            .post(self.url("/translate"))
            .json(&body)
            .send()
            .await
            .map_err(connection)?;
        decode(response).await
    }

    pub async fn languages(&self) -> Result<LanguagesResponse> {
        self.get("/languages").await
    }

    /// Composite health; a 503 still carries the snapshot
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(connection)?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return response
                .json()
                .await
                .map_err(|e| SdkError::Decode(e.to_string()));
        }
        decode(response).await
    }

    pub async fn metrics(&self) -> Result<MetricsResponse> {
        self.get("/health/metrics").await
    }

    pub async fn info(&self) -> Result<InfoResponse> {
        self.get("/health/info").await
    }

    /// Service version and host identity
    pub async fn version(&self) -> Result<VersionResponse> {
        self.get("/health/version").await
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        self.get("/stats").await
    }

    /// Ask the daemon to (re)start the engine; waits for the outcome
    pub async fn start_engine(&self) -> Result<EngineStatus> {
        let response = self
            .http
            .post(self.url("/engine/start"))
            .send()
            .await
            .map_err(connection)?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(connection)?;
        decode(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn connection(e: reqwest::Error) -> SdkError {
    SdkError::Connection(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| SdkError::Decode(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.to_string()
            } else {
                text
            }
        });
    Err(SdkError::Api {
        status: status.as_u16(),
        message,
    })
}
