//! Core Kernel - Foundational types shared by the stock opname crates
//!
//! This crate provides the building blocks used by the domain and
//! infrastructure layers:
//! - Strongly-typed identifiers for sessions, line items, adjustments and products
//! - The kernel error type
//! - Port infrastructure for the hexagonal (ports and adapters) architecture

pub mod identifiers;
pub mod error;
pub mod ports;

pub use identifiers::{OpnameId, LineItemId, AdjustmentId, ProductId};
pub use error::CoreError;
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
