//! Logger error type

use thiserror::Error;

/// Error type for logger operations
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LogError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filter parsing error
    #[error("Invalid filter '{filter}': {message}")]
    Filter {
        /// The rejected filter directive
        filter: String,
        /// Parser message
        message: String,
    },
}

impl LogError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a filter parsing error
    pub fn filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Filter {
            filter: filter.into(),
            message: message.into(),
        }
    }
}

/// Result type for logger operations
pub type LogResult<T> = Result<T, LogError>;
