// Port Layer - Interfaces for external dependencies

pub mod engine_transport;
pub mod health_endpoint;
pub mod id_provider; // For deterministic testing
pub mod process_launcher;
pub mod process_probe;
pub mod system_probe;
pub mod time_provider;

// Re-exports
pub use engine_transport::{EngineReply, EngineTransport, TransportError};
pub use health_endpoint::{HealthEndpoint, ProbeOutcome};
pub use id_provider::{IdProvider, UuidProvider};
pub use process_launcher::{ChildHandle, ExitReporter, LaunchError, ProcessLauncher};
pub use process_probe::{ProcessProbe, ServiceControlError};
pub use system_probe::SystemProbe;
pub use time_provider::{SystemTimeProvider, TimeProvider};
