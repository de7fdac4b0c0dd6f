// Response Cache (content-addressed, TTL + optional LRU bound, single-flight)

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::application::cancel::CancelToken;
use crate::domain::{CacheConfig, TranslationRequest, TranslationResult};
use crate::error::{AppError, Result};

/// SHA-256 over the normalized request fields, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_request(request: &TranslationRequest) -> Self {
        let (text, source, target) = request.normalized();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(source.as_bytes());
        hasher.update([0x1f]);
        hasher.update(target.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a returned value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOrigin {
    Hit,
    /// This caller started the computation
    Computed,
    /// This caller joined a computation already in flight
    Joined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub joined: u64,
    pub computations: u64,
    pub evictions: u64,
    pub entries: usize,
    pub in_flight: usize,
}

struct CacheEntry {
    value: TranslationResult,
    inserted_at: Instant,
    last_access: Instant,
}

type Flight = Shared<BoxFuture<'static, Result<TranslationResult>>>;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
}

struct CacheInner {
    // Lock order: in_flight before entries
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, Flight>>,
    ttl: Duration,
    capacity: Option<usize>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CacheInner {
    fn lookup(&self, key: &CacheKey) -> Option<TranslationResult> {
        let mut entries = lock(&self.entries);
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                entry.last_access = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Publish a finished computation: store successes, always clear the flight
    fn finish(&self, key: &CacheKey, result: &Result<TranslationResult>) {
        let mut in_flight = lock(&self.in_flight);
        in_flight.remove(key);
        if let Ok(value) = result {
            let now = Instant::now();
            let mut entries = lock(&self.entries);
            entries.insert(
                key.clone(),
                CacheEntry {
                    value: value.clone(),
                    inserted_at: now,
                    last_access: now,
                },
            );
            self.enforce_capacity(&mut entries, now);
        }
    }

    fn enforce_capacity(&self, entries: &mut HashMap<CacheKey, CacheEntry>, now: Instant) {
        let Some(capacity) = self.capacity else {
            return;
        };
        if entries.len() <= capacity {
            return;
        }
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.inserted_at) < self.ttl);
        while entries.len() > capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }
        self.counters
            .evictions
            .fetch_add((before - entries.len()) as u64, Ordering::Relaxed);
    }
}

/// Cache in front of the translation gateway.
///
/// Cloning is cheap; clones share the same storage.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                ttl,
                capacity,
                counters: Counters::default(),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.capacity())
    }

    /// Return the cached value for `request`, or run `compute` once for all
    /// concurrent callers with the same key.
    pub async fn get_or_compute<F, Fut>(
        &self,
        request: &TranslationRequest,
        compute: F,
    ) -> Result<TranslationResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TranslationResult>> + Send + 'static,
    {
        self.get_or_compute_traced(request, compute)
            .await
            .map(|(value, _)| value)
    }

    /// Same as [`ResponseCache::get_or_compute`], also reporting the origin
    pub async fn get_or_compute_traced<F, Fut>(
        &self,
        request: &TranslationRequest,
        compute: F,
    ) -> Result<(TranslationResult, CacheOrigin)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TranslationResult>> + Send + 'static,
    {
        let key = CacheKey::for_request(request);
        let counters = &self.inner.counters;

        if let Some(hit) = self.inner.lookup(&key) {
            counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, CacheOrigin::Hit));
        }

        let (flight, origin) = {
            let mut in_flight = lock(&self.inner.in_flight);
            if let Some(existing) = in_flight.get(&key) {
                counters.joined.fetch_add(1, Ordering::Relaxed);
                (existing.clone(), CacheOrigin::Joined)
            } else if let Some(hit) = self.inner.lookup(&key) {
                // Completed between the first lookup and taking the flight lock
                counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((hit, CacheOrigin::Hit));
            } else {
                counters.misses.fetch_add(1, Ordering::Relaxed);
                counters.computations.fetch_add(1, Ordering::Relaxed);
                let flight = self.launch(key.clone(), compute());
                in_flight.insert(key.clone(), flight.clone());
                (flight, CacheOrigin::Computed)
            }
        };

        if origin == CacheOrigin::Joined {
            debug!(key = %key.as_str(), "Joining in-flight translation");
        }
        flight.await.map(|value| (value, origin))
    }

    /// Run the computation on its own task so it completes even if every
    /// waiting caller goes away.
    fn launch<Fut>(&self, key: CacheKey, computation: Fut) -> Flight
    where
        Fut: Future<Output = Result<TranslationResult>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = computation.await;
            inner.finish(&task_key, &result);
            result
        });

        let inner = self.inner.clone();
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    lock(&inner.in_flight).remove(&key);
                    Err(AppError::Internal(format!(
                        "cache computation aborted: {join_error}"
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.inner.ttl;
        let mut entries = lock(&self.inner.entries);
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
        let purged = before - entries.len();
        self.inner
            .counters
            .evictions
            .fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Periodically purge expired entries until `shutdown` fires
    pub async fn run_sweeper(&self, interval: Duration, shutdown: CancelToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        info!(interval_secs = interval.as_secs(), "Cache sweeper started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = self.purge_expired();
                    if purged > 0 {
                        debug!(purged, "Expired cache entries purged");
                    }
                }
            }
        }
        info!("Cache sweeper stopped");
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            joined: counters.joined.load(Ordering::Relaxed),
            computations: counters.computations.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
            in_flight: lock(&self.inner.in_flight).len(),
        }
    }
}
