//! Opname domain errors
//!
//! Guard violations (`NotFound`, `InvalidState`, `ValidationFailed`) are
//! raised before anything is written and are safe to report back to the
//! caller as-is. `PersistenceFailed` wraps a store failure; when it happens
//! inside a transaction the transaction is rolled back.

use thiserror::Error;

use core_kernel::PortError;
use crate::session::OpnameStatus;

/// Errors that can occur in the opname domain
#[derive(Debug, Error)]
pub enum OpnameError {
    /// A session, line item or product id does not resolve
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The session is in the wrong status for the requested operation
    #[error("Cannot {operation} a stock opname in {status} status")]
    InvalidState {
        operation: &'static str,
        status: OpnameStatus,
    },

    /// Input or aggregate rules were violated
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The underlying store failed
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[source] PortError),
}

impl OpnameError {
    /// Creates a NotFound error
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        OpnameError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates an InvalidState error
    pub fn invalid_state(operation: &'static str, status: OpnameStatus) -> Self {
        OpnameError::InvalidState { operation, status }
    }

    /// Creates a ValidationFailed error
    pub fn validation(message: impl Into<String>) -> Self {
        OpnameError::ValidationFailed(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OpnameError::NotFound { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, OpnameError::InvalidState { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OpnameError::ValidationFailed(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, OpnameError::PersistenceFailed(_))
    }
}

impl From<PortError> for OpnameError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => OpnameError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, .. } => OpnameError::ValidationFailed(message),
            PortError::Conflict { message } => OpnameError::ValidationFailed(message),
            other => OpnameError::PersistenceFailed(other),
        }
    }
}
