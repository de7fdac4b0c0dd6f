// Domain Layer - Pure types and the supervisor state machine

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod translation;

// Re-exports
pub use config::{CacheConfig, EngineConfig, RestartPolicy, SubprocessSpec};
pub use error::DomainError;
pub use health::{
    HealthCheck, HealthSnapshot, HealthStatus, HostMetrics, ProbeRecord, SystemInfo,
};
pub use lifecycle::{
    ExitInfo, LifecycleEvent, OwnershipKind, SupervisorState, SupervisorStatus,
};
pub use translation::{TranslationRequest, TranslationResult, MAX_TEXT_CHARS};
