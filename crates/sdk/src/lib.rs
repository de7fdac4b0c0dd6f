//! Linguard SDK - Rust Client Library
//!
//! Provides a convenient client for the Linguard HTTP API.
//!
//! # Example
//!
//! ```no_run
//! use linguard_sdk::LinguardClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LinguardClient::new("http://127.0.0.1:8080")?;
//!
//!     let response = client.translate("안녕하세요", "ko", "en").await?;
//!     println!("{} ({}ms)", response.translated_text, response.latency_ms);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::LinguardClient;
pub use error::{Result, SdkError};
pub use types::{
    CacheStats, EngineStatus, ExitInfo, HealthCheck, HealthResponse, InfoResponse,
    LanguagesResponse, MetricsResponse, StatsResponse, TranslateRequest, TranslateResponse,
    VersionResponse,
};
