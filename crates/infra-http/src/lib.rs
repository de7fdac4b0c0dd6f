// Linguard Infrastructure - HTTP Adapters
// Implements: EngineTransport, HealthEndpoint (ADR-002)

pub mod health_endpoint;
pub mod transport;

pub use health_endpoint::HttpHealthEndpoint;
pub use transport::ReqwestTransport;
