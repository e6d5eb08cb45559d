//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the stock opname system using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern:
//! - [`repositories`] holds the SQL and row types
//! - [`adapters`] implements the domain ports on top of the repositories
//! - [`pool`] creates connection pools and applies the schema migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresOpnameStore};
//!
//! let pool = create_pool(&DatabaseConfig::new("postgres://localhost/opname")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresOpnameStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, create_pool_from_url, run_migrations};
pub use error::DatabaseError;
pub use repositories::OpnameRepository;
pub use adapters::{PgOpnameTransaction, PostgresOpnameStore};
