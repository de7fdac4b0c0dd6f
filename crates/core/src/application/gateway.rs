// Translation Gateway
//
// Stateless client for the engine's HTTP surface. Validates locally, forwards,
// and maps every transport outcome onto the error taxonomy.

use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::application::constants::MAX_ENGINE_DETAIL_CHARS;
use crate::domain::{EngineConfig, TranslationRequest, TranslationResult};
use crate::error::{AppError, Result};
use crate::port::{EngineReply, EngineTransport};

/// Engine response body for POST /translate
#[derive(Debug, Deserialize)]
struct EngineTranslation {
    success: Option<bool>,
    #[serde(alias = "translatedText")]
    translated_text: Option<String>,
    #[serde(alias = "sourceLang")]
    source_lang: Option<String>,
    #[serde(alias = "detectedLang")]
    detected_lang: Option<String>,
    error: Option<String>,
}

pub struct TranslationGateway {
    transport: Arc<dyn EngineTransport>,
    translate_path: String,
    languages_path: String,
}

impl TranslationGateway {
    pub fn new(transport: Arc<dyn EngineTransport>, config: &EngineConfig) -> Self {
        Self {
            transport,
            translate_path: config.translate_path.clone(),
            languages_path: config.languages_path.clone(),
        }
    }

    /// Translate one request.
    ///
    /// # Errors
    /// - `InvalidRequest` before any network call if validation fails
    /// - `EngineUnavailable` on connection failure or timeout
    /// - `EngineRejected` on a non-2xx answer
    /// - `EngineProtocol` on a 2xx answer we cannot interpret
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        request.validate()?;

        let payload = json!({
            "text": request.text(),
            "source_lang": request.source_lang(),
            "target_lang": request.target_lang(),
        });

        let started = Instant::now();
        let reply = self
            .transport
            .post_json(&self.translate_path, &payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "Engine translate call failed");
                AppError::EngineUnavailable(e.to_string())
            })?;
        let latency = started.elapsed();

        if !reply.is_success() {
            return Err(rejected(&reply));
        }

        let body: EngineTranslation = serde_json::from_slice(&reply.body)
            .map_err(|e| protocol_error(format!("undecodable translate response: {e}")))?;

        if body.success == Some(false) {
            return Err(protocol_error(format!(
                "engine answered {} with success=false: {}",
                reply.status,
                body.error.unwrap_or_default()
            )));
        }
        let translated_text = body
            .translated_text
            .ok_or_else(|| protocol_error("translate response lacks translated_text".into()))?;

        debug!(
            source = %request.source_lang(),
            target = %request.target_lang(),
            latency_ms = latency.as_millis() as u64,
            "Engine translation completed"
        );

        Ok(TranslationResult {
            translated_text,
            detected_lang: body.detected_lang.or(body.source_lang),
            latency,
        })
    }

    /// Languages supported by the engine (code -> display name)
    pub async fn supported_languages(&self) -> Result<BTreeMap<String, String>> {
        let reply = self
            .transport
            .get(&self.languages_path)
            .await
            .map_err(|e| AppError::EngineUnavailable(e.to_string()))?;
        if !reply.is_success() {
            return Err(rejected(&reply));
        }

        let value: serde_json::Value = serde_json::from_slice(&reply.body)
            .map_err(|e| protocol_error(format!("undecodable languages response: {e}")))?;
        // Either a bare map or wrapped as {"languages": {...}}
        let map = value.get("languages").unwrap_or(&value);
        serde_json::from_value::<BTreeMap<String, String>>(map.clone())
            .map_err(|e| protocol_error(format!("unexpected languages shape: {e}")))
    }
}

fn protocol_error(detail: String) -> AppError {
    error!(detail = %detail, "Engine protocol error");
    AppError::EngineProtocol(detail)
}

/// Map a non-2xx reply to `EngineRejected`, preferring the engine's own message
fn rejected(reply: &EngineReply) -> AppError {
    let detail = serde_json::from_slice::<serde_json::Value>(&reply.body)
        .ok()
        .and_then(|v| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|field| v.get(*field).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| String::from_utf8_lossy(&reply.body).into_owned());
    let detail: String = detail.chars().take(MAX_ENGINE_DETAIL_CHARS).collect();

    warn!(status = reply.status, detail = %detail, "Engine rejected request");
    AppError::EngineRejected {
        status: reply.status,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::engine_transport::mocks::FakeTransport;
    use crate::port::TransportError;
    use std::time::Duration;

    fn gateway(transport: Arc<FakeTransport>) -> TranslationGateway {
        TranslationGateway::new(transport, &EngineConfig::default())
    }

    #[tokio::test]
    async fn test_translate_forwards_snake_case_payload() {
        let transport = Arc::new(FakeTransport::new(|path, body| {
            assert_eq!(path, "/translate");
            let body = body.unwrap();
            assert_eq!(body["source_lang"], "ja");
            assert_eq!(body["target_lang"], "en");
            Ok(EngineReply::json(
                200,
                &json!({"success": true, "translated_text": "Hello", "source_lang": "ja"}),
            ))
        }));
        let result = gateway(transport.clone())
            .translate(&TranslationRequest::new("こんにちは", "ja", "en"))
            .await
            .unwrap();

        assert_eq!(result.translated_text, "Hello");
        assert_eq!(result.detected_lang.as_deref(), Some("ja"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_text_never_reaches_engine() {
        let transport = Arc::new(FakeTransport::echo_upper());
        let err = gateway(transport.clone())
            .translate(&TranslationRequest::new("x".repeat(1001), "en", "ko"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_2xx_is_rejected_with_engine_detail() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Ok(EngineReply::json(
                503,
                &json!({"success": false, "error": "Model not loaded"}),
            ))
        }));
        let err = gateway(transport)
            .translate(&TranslationRequest::new("hi", "en", "ko"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::EngineRejected {
                status: 503,
                detail: "Model not loaded".into()
            }
        );
    }

    #[tokio::test]
    async fn test_plain_text_rejection_is_truncated() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Ok(EngineReply {
                status: 500,
                body: "E".repeat(1000).into_bytes(),
            })
        }));
        let err = gateway(transport)
            .translate(&TranslationRequest::new("hi", "en", "ko"))
            .await
            .unwrap_err();

        match err {
            AppError::EngineRejected { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail.len(), MAX_ENGINE_DETAIL_CHARS);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failures_are_unavailable() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Err(TransportError::Timeout(Duration::from_secs(30)))
        }));
        let err = gateway(transport)
            .translate(&TranslationRequest::new("hi", "en", "ko"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EngineUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_protocol_errors() {
        let cases: Vec<Vec<u8>> = vec![
            b"<html>oops</html>".to_vec(),
            br#"{"success": true}"#.to_vec(),
            br#"{"success": false, "error": "boom"}"#.to_vec(),
        ];
        for body in cases {
            let transport = Arc::new(FakeTransport::new(move |_, _| {
                Ok(EngineReply {
                    status: 200,
                    body: body.clone(),
                })
            }));
            let err = gateway(transport)
                .translate(&TranslationRequest::new("hi", "en", "ko"))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::EngineProtocol(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn test_camel_case_response_accepted() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Ok(EngineReply::json(
                200,
                &json!({"translatedText": "안녕", "detectedLang": "en"}),
            ))
        }));
        let result = gateway(transport)
            .translate(&TranslationRequest::new("hi", "en", "ko"))
            .await
            .unwrap();
        assert_eq!(result.translated_text, "안녕");
        assert_eq!(result.detected_lang.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_supported_languages_both_shapes() {
        let bare = Arc::new(FakeTransport::new(|path, _| {
            assert_eq!(path, "/languages");
            Ok(EngineReply::json(200, &json!({"en": "English", "ko": "Korean"})))
        }));
        let langs = gateway(bare).supported_languages().await.unwrap();
        assert_eq!(langs.get("ko").map(String::as_str), Some("Korean"));

        let wrapped = Arc::new(FakeTransport::new(|_, _| {
            Ok(EngineReply::json(200, &json!({"languages": {"ja": "Japanese"}})))
        }));
        let langs = gateway(wrapped).supported_languages().await.unwrap();
        assert_eq!(langs.len(), 1);
    }
}
