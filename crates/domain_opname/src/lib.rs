//! Stock Opname Domain
//!
//! This crate reconciles recorded inventory quantities against a physical
//! count. A count runs as an [`OpnameSession`] through a small lifecycle and,
//! when completed, corrects live stock and leaves one immutable
//! [`AdjustmentRecord`] per product whose count differed.
//!
//! # Session Lifecycle
//!
//! ```text
//! Draft -> In Progress -> Completed
//!   \          \
//!    +----------+-> Canceled
//! ```
//!
//! # Examples
//!
//! ```rust
//! use domain_opname::{Discrepancy, SeverityBands};
//!
//! let discrepancy = Discrepancy::calculate(100, 75);
//! let bands = SeverityBands::default();
//! let band = bands.classify_discrepancy(&discrepancy);
//! assert_eq!(band.map(|b| b.name.as_str()), Some("HIGH_LOSS"));
//! ```

pub mod discrepancy;
pub mod line_item;
pub mod session;
pub mod adjustment;
pub mod ports;
pub mod services;
pub mod report;
pub mod error;

pub use discrepancy::{Discrepancy, SeverityBand, SeverityBands};
pub use line_item::LineItem;
pub use session::{OpnameCategory, OpnameSession, OpnameStatus};
pub use adjustment::{AdjustmentQuery, AdjustmentRecord, AdjustmentRecorder, ReasonCode};
pub use ports::{OpnameStore, OpnameTransaction, ProductCatalog, SessionQuery, StockLedger};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{FaultPlan, MockOpnameStore, MockProductCatalog};
pub use services::{CompletionOutcome, ManualAdjustment, OpnameService, ServiceOptions, StockWritePolicy};
pub use report::{AdjustmentHistoryEntry, DiscrepancyReport, DiscrepancyRow};
pub use error::OpnameError;
