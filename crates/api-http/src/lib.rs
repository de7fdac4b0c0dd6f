//! HTTP API Layer
//!
//! Public HTTP surface of Linguard: translate, languages, health, stats and
//! manual engine start.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig, AppState};
