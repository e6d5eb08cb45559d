//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! stock opname test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for sessions and products
//! - `builders`: In-memory service wiring and request builders
//! - `database`: PostgreSQL test container management
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
