//! Database connection pool management
//!
//! Pool configuration, pool creation and schema migrations for PostgreSQL.

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Configuration options for the database connection pool
///
/// Timeouts are expressed in seconds so the struct can be read directly
/// from configuration files and environment variables.
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
///
/// let config = DatabaseConfig::new("postgres://localhost/opname")
///     .max_connections(20)
///     .min_connections(5)
///     .connect_timeout_secs(10);
/// assert_eq!(config.connect_timeout().as_secs(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Seconds to wait when acquiring a connection
    pub connect_timeout_secs: u64,
    /// Maximum lifetime of a connection in seconds
    pub max_lifetime_secs: u64,
    /// Idle seconds before a connection is closed
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Creates a new database configuration with the given connection URL
    /// and default pool settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            max_lifetime_secs: 30 * 60,
            idle_timeout_secs: 10 * 60,
        }
    }

    /// Sets the maximum number of connections in the pool
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections to maintain
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire timeout
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/opname")
    }
}

/// Creates a database connection pool with the given configuration
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the pool cannot be created
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::{DatabaseConfig, create_pool};
///
/// let config = DatabaseConfig::new("postgres://localhost/opname");
/// let pool = create_pool(&config).await?;
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .max_lifetime(config.max_lifetime())
        .idle_timeout(config.idle_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("Database pool created successfully");
    Ok(pool)
}

/// Creates a connection pool from a URL string with default settings
pub async fn create_pool_from_url(url: &str) -> Result<DatabasePool, DatabaseError> {
    create_pool(&DatabaseConfig::new(url)).await
}

/// Applies the SQL migrations under `migrations/` at the workspace root
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if any migration fails to apply
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
    info!("Database migrations applied");
    Ok(())
}
