// Translation Service - request pipeline
//
// validate -> cache (single-flight) -> engine gate -> gateway.
// Cache hits never touch the engine, so they are served in any engine state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::application::cache::{CacheOrigin, CacheStats, ResponseCache};
use crate::application::gateway::TranslationGateway;
use crate::application::supervisor::StatusReader;
use crate::domain::{SupervisorState, TranslationRequest, TranslationResult};
use crate::error::{AppError, Result};

struct CachedLanguages {
    fetched_at: Instant,
    languages: BTreeMap<String, String>,
}

pub struct TranslationService {
    gateway: Arc<TranslationGateway>,
    cache: ResponseCache,
    engine: StatusReader,
    languages: Mutex<Option<CachedLanguages>>,
    languages_ttl: Duration,
}

impl TranslationService {
    pub fn new(
        gateway: Arc<TranslationGateway>,
        cache: ResponseCache,
        engine: StatusReader,
        languages_ttl: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            engine,
            languages: Mutex::new(None),
            languages_ttl,
        }
    }

    /// Translate `request`, reporting whether the answer came from the cache.
    ///
    /// # Errors
    /// - `InvalidRequest` before the cache is consulted
    /// - `EngineUnavailable` if the engine is not Ready and the answer is not cached
    /// - any gateway error, shared by every caller joined on the same key
    pub async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<(TranslationResult, CacheOrigin)> {
        request.validate()?;

        let gateway = self.gateway.clone();
        let engine = self.engine.clone();
        let owned = request.clone();
        let (result, origin) = self
            .cache
            .get_or_compute_traced(request, move || async move {
                ensure_ready(&engine)?;
                gateway.translate(&owned).await
            })
            .await?;

        debug!(
            origin = ?origin,
            source = request.source_lang(),
            target = request.target_lang(),
            chars = request.text().chars().count(),
            "Translation served"
        );
        Ok((result, origin))
    }

    /// Supported languages, refreshed from the engine once the cached copy expires
    pub async fn languages(&self) -> Result<BTreeMap<String, String>> {
        let mut cached = self.languages.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.languages_ttl {
                return Ok(entry.languages.clone());
            }
        }

        ensure_ready(&self.engine)?;
        let languages = self.gateway.supported_languages().await?;
        info!(count = languages.len(), "Supported languages refreshed");
        *cached = Some(CachedLanguages {
            fetched_at: Instant::now(),
            languages: languages.clone(),
        });
        Ok(languages)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

fn ensure_ready(engine: &StatusReader) -> Result<()> {
    match engine.state() {
        SupervisorState::Ready => Ok(()),
        state => Err(AppError::EngineUnavailable(format!("engine is {state}"))),
    }
}
