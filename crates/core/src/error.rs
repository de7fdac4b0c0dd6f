// Central Error Type for the Application

use thiserror::Error;

use crate::domain::DomainError;

/// Application-level error type.
///
/// `Clone` so that a single in-flight computation can hand the same outcome
/// (success or failure) to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Caller error; never retried
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Engine not reachable or not Ready; caller may retry
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Engine answered with a non-2xx status
    #[error("Engine rejected request ({status}): {detail}")]
    EngineRejected { status: u16, detail: String },

    /// Engine answered 2xx with a body we cannot interpret
    #[error("Engine protocol error: {0}")]
    EngineProtocol(String),

    #[error("Engine did not become ready within {timeout_secs}s")]
    StartupTimeout { timeout_secs: u64 },

    /// Executable missing or unrunnable; never retried
    #[error("Process launch failed: {0}")]
    ProcessLaunch(String),

    #[error("Engine exited during startup: {0}")]
    EngineExited(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the same operation later can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::EngineUnavailable(_)
            | AppError::StartupTimeout { .. }
            | AppError::EngineExited(_) => true,
            AppError::EngineRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Stable machine-readable kind (used in logs and API error bodies)
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::EngineUnavailable(_) => "ENGINE_UNAVAILABLE",
            AppError::EngineRejected { .. } => "ENGINE_REJECTED",
            AppError::EngineProtocol(_) => "ENGINE_PROTOCOL_ERROR",
            AppError::StartupTimeout { .. } => "STARTUP_TIMEOUT",
            AppError::ProcessLaunch(_) => "PROCESS_LAUNCH_FAILURE",
            AppError::EngineExited(_) => "ENGINE_EXITED",
            AppError::Cancelled(_) => "CANCELLED",
            AppError::Config(_) => "CONFIG",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        if err.is_validation() {
            AppError::InvalidRequest(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
