//! Repository implementations
//!
//! Repositories encapsulate SQL and map database rows. Reads run on the
//! pool; writes are associated functions taking a `&mut PgConnection` so
//! that callers decide which transaction they belong to.

pub mod opname;

pub use opname::OpnameRepository;
