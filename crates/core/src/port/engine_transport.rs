// Engine Transport Port - raw HTTP exchange with the translation engine
//
// The gateway (application layer) owns validation, payload shape and error
// mapping; implementations only move bytes and classify transport failures.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Raw engine response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl EngineReply {
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self {
            status,
            body: value.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failures (no usable HTTP response)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// POST a JSON body to `path` (relative to the engine base URL)
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<EngineReply, TransportError>;

    /// GET `path` (relative to the engine base URL)
    async fn get(&self, path: &str) -> Result<EngineReply, TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Handler = dyn Fn(&str, Option<&serde_json::Value>) -> Result<EngineReply, TransportError>
        + Send
        + Sync;

    /// Transport answering from a closure and counting calls
    pub struct FakeTransport {
        handler: Arc<Handler>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeTransport {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&str, Option<&serde_json::Value>) -> Result<EngineReply, TransportError>
                + Send
                + Sync
                + 'static,
        {
            Self {
                handler: Arc::new(handler),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        /// Engine that uppercases the text it receives
        pub fn echo_upper() -> Self {
            Self::new(|_, body| {
                let body = body.cloned().unwrap_or_default();
                let text = body["text"].as_str().unwrap_or_default().to_uppercase();
                Ok(EngineReply::json(
                    200,
                    &serde_json::json!({
                        "success": true,
                        "translated_text": text,
                        "source_lang": body["source_lang"],
                        "target_lang": body["target_lang"],
                        "original_text": body["text"],
                    }),
                ))
            })
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EngineTransport for FakeTransport {
        async fn post_json(
            &self,
            path: &str,
            body: &serde_json::Value,
        ) -> Result<EngineReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.handler)(path, Some(body))
        }

        async fn get(&self, path: &str) -> Result<EngineReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.handler)(path, None)
        }
    }
}
