// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid supervisor transition: {event} in state {from}")]
    InvalidStateTransition { from: String, event: String },

    #[error("Text cannot be empty")]
    EmptyText,

    #[error("Text too long (max {max} characters)")]
    TextTooLong { len: usize, max: usize },

    #[error("{0} language is required")]
    MissingLanguage(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// True for errors caused by caller input (surface as `InvalidRequest`)
    pub fn is_validation(&self) -> bool {
        !matches!(self, DomainError::InvalidStateTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
