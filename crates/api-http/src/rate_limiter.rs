//! Rate Limiter (Token Bucket Algorithm)
//!
//! Per-client buckets protect the engine from a single noisy caller.
//! Each bucket uses atomic operations to avoid lock contention under load.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Buckets tracked before idle (full) ones are dropped
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Token bucket with atomic state
pub struct TokenBucket {
    state: AtomicState,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
}

struct AtomicState {
    // Upper 32 bits: tokens * 1000 (fixed-point)
    // Lower 32 bits: last_refill timestamp (milliseconds since creation)
    packed: AtomicU64,
    creation_time: Instant,
}

impl TokenBucket {
    /// Create a full bucket
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum burst size
    /// * `refill_rate` - Tokens added per second
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            state: AtomicState {
                packed: AtomicU64::new(Self::pack(max_tokens as u64 * 1000, 0)),
                creation_time: Instant::now(),
            },
            max_tokens,
            refill_rate,
        }
    }

    fn pack(milli_tokens: u64, at_ms: u32) -> u64 {
        (milli_tokens << 32) | at_ms as u64
    }

    /// Tokens (in thousandths) after refilling up to now
    fn refilled(&self, packed: u64, now_ms: u32) -> u64 {
        let milli = packed >> 32;
        let last_ms = (packed & 0xFFFF_FFFF) as u32;
        let delta_ms = now_ms.saturating_sub(last_ms) as u64;
        // refill_rate tokens/s == refill_rate milli-tokens/ms
        (milli + delta_ms * self.refill_rate as u64).min(self.max_tokens as u64 * 1000)
    }

    fn now_ms(&self) -> u32 {
        self.state.creation_time.elapsed().as_millis() as u32
    }

    /// Consume one token if available
    ///
    /// Uses atomic CAS loop to avoid lock contention
    pub fn try_acquire(&self) -> bool {
        loop {
            let packed = self.state.packed.load(Ordering::Acquire);
            let now_ms = self.now_ms();
            let available = self.refilled(packed, now_ms);
            if available < 1000 {
                return false;
            }
            let next = Self::pack(available - 1000, now_ms);
            // CAS: retry if another request raced us
            if self
                .state
                .packed
                .compare_exchange(packed, next, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Whole tokens currently available
    pub fn remaining(&self) -> u32 {
        let packed = self.state.packed.load(Ordering::Acquire);
        (self.refilled(packed, self.now_ms()) / 1000) as u32
    }

    fn is_full(&self) -> bool {
        self.remaining() >= self.max_tokens
    }
}

/// One token bucket per client IP
pub struct ClientRateLimiter {
    buckets: Mutex<HashMap<IpAddr, Arc<TokenBucket>>>,
    burst: u32,
    refill_per_sec: u32,
}

impl ClientRateLimiter {
    /// Allow `burst` requests at once per client, refilled at `refill_per_sec`
    pub fn new(burst: u32, refill_per_sec: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            burst,
            refill_per_sec,
        }
    }

    /// Returns true if the request from `client` is allowed
    pub fn check(&self, client: IpAddr) -> bool {
        let bucket = {
            let mut buckets = self
                .buckets
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(&client) {
                buckets.retain(|_, bucket| !bucket.is_full());
            }
            buckets
                .entry(client)
                .or_insert_with(|| Arc::new(TokenBucket::new(self.burst, self.refill_per_sec)))
                .clone()
        };
        bucket.try_acquire()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .map(|buckets| buckets.len())
            .unwrap_or_default()
    }
}
