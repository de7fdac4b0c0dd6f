// Application Layer - Use Cases and Business Logic

pub mod cache;
pub mod cancel;
pub mod constants;
pub mod gateway;
pub mod health;
pub mod readiness;
pub mod restart;
pub mod supervisor;
pub mod translation;

// Re-exports
pub use cache::{CacheKey, CacheOrigin, CacheStats, ResponseCache};
pub use cancel::{cancel_channel, CancelSource, CancelToken};
pub use gateway::TranslationGateway;
pub use health::HealthAggregator;
pub use readiness::{ProbeLedger, ReadinessError, ReadinessPoller};
pub use restart::RestartDecision;
pub use supervisor::{ProcessSupervisor, StatusReader, Transition};
pub use translation::TranslationService;
