// Health Endpoint Port - one lightweight readiness request per call

use async_trait::async_trait;

/// Result of one probe. Connection refused/reset is `ready: false`, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub ready: bool,
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn ready(detail: impl Into<String>) -> Self {
        Self {
            ready: true,
            detail: Some(detail.into()),
        }
    }

    pub fn not_ready(detail: impl Into<String>) -> Self {
        Self {
            ready: false,
            detail: Some(detail.into()),
        }
    }
}

#[async_trait]
pub trait HealthEndpoint: Send + Sync {
    /// Issue a single request; 2xx means ready
    async fn check(&self) -> ProbeOutcome;

    /// Target URL, for logs
    fn target(&self) -> &str;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Health endpoint driven by a script, then by a steady flag
    pub struct ScriptedHealthEndpoint {
        ready: AtomicBool,
        script: Mutex<VecDeque<bool>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedHealthEndpoint {
        pub fn new(ready: bool) -> Self {
            Self {
                ready: AtomicBool::new(ready),
                script: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        /// Answers consumed in order before falling back to the steady flag
        pub fn with_script(ready: bool, script: impl IntoIterator<Item = bool>) -> Self {
            let endpoint = Self::new(ready);
            endpoint.script.lock().unwrap().extend(script);
            endpoint
        }

        /// Each check sleeps for `delay` first
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn set_ready(&self, ready: bool) {
            self.ready.store(ready, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthEndpoint for ScriptedHealthEndpoint {
        async fn check(&self) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            let ready = scripted.unwrap_or_else(|| self.ready.load(Ordering::SeqCst));
            if ready {
                ProbeOutcome::ready("200 OK")
            } else {
                ProbeOutcome::not_ready("connection refused")
            }
        }

        fn target(&self) -> &str {
            "fake://engine/health"
        }
    }
}
