//! SDK Error Types

use thiserror::Error;

/// SDK Result type
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK Error
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-success response with the server's error message
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SdkError {
    /// Whether the server rejected the request itself (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, SdkError::Api { status, .. } if (400..500).contains(status))
    }
}
