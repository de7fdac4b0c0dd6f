// ID Provider Port (trace ids on error responses)

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique trace ID
    fn trace_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn trace_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// trace-1, trace-2, ...
    #[derive(Default)]
    pub struct SequentialIds {
        next: AtomicU64,
    }

    impl IdProvider for SequentialIds {
        fn trace_id(&self) -> String {
            format!("trace-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }
}
