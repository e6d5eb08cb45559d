//! Kernel error type for configuration and identifier failures

use thiserror::Error;

/// Errors raised outside any single domain: bad configuration at startup
/// and identifiers that fail to parse
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] uuid::Error),
}

impl CoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}
