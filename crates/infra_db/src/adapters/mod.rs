//! Domain Adapters
//!
//! Adapter implementations for domain ports, connecting domain interfaces
//! to the PostgreSQL database layer.
//!
//! # Architecture
//!
//! Each adapter:
//! - Implements the domain's port traits
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresOpnameStore;
//! use domain_opname::OpnameStore;
//!
//! let store = PostgresOpnameStore::new(pool);
//! let session = store.get_session(session_id).await?;
//! ```

pub mod opname;

pub use opname::{PgOpnameTransaction, PostgresOpnameStore};
