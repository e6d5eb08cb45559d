//! Database error types
//!
//! This module defines the error types that can occur during database operations
//! and their translation into the port errors the domain understands.

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur during database operations
///
/// This enum captures all possible database-related errors, including
/// connection issues, query failures, and constraint violations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Transaction error
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("OpnameSession", "OPN-123");
    /// assert!(error.to_string().contains("OpnameSession"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Creates a duplicate entry error
    pub fn duplicate(entity: &str, field: &str, value: impl std::fmt::Display) -> Self {
        DatabaseError::DuplicateEntry(format!(
            "{} with {} '{}' already exists",
            entity, field, value
        ))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Maps a raw SQLx error onto a specific variant where the PostgreSQL
    /// error code allows it, keeping the original error otherwise
    pub fn classify(self) -> Self {
        if let DatabaseError::SqlError(sql) = &self {
            match DatabaseError::from(sql) {
                DatabaseError::QueryFailed(_) => {}
                classified => return classified,
            }
        }
        self
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// This function analyzes the SQLx error and maps it to the appropriate
/// DatabaseError variant based on the PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::Database(db_err) => {
                // PostgreSQL error codes
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                        "23503" => {
                            DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                        }
                        "23514" => {
                            DatabaseError::ConstraintViolation(db_err.message().to_string())
                        }
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

/// Translates database failures at the adapter boundary
///
/// - `NotFound` -> `PortError::NotFound`
/// - `DuplicateEntry` -> `PortError::Conflict`
/// - foreign key and check violations -> `PortError::Validation`
/// - connection problems -> `PortError::Connection`
/// - everything else -> `PortError::Internal`
impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error.classify() {
            DatabaseError::NotFound { entity, id } => PortError::NotFound {
                entity_type: entity,
                id,
            },
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::ForeignKeyViolation(message)
            | DatabaseError::ConstraintViolation(message) => PortError::validation(message),
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::PoolExhausted => PortError::connection("connection pool exhausted"),
            other => PortError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
