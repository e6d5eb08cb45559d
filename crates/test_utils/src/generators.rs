//! Property-Based Test Generators
//!
//! Proptest strategies for generating count data that respects the domain
//! invariants (non-negative quantities, unique products per session).

use proptest::collection::vec;
use proptest::prelude::*;

use domain_opname::ReasonCode;

/// Strategy for live or counted quantities
pub fn quantity_strategy() -> impl Strategy<Value = i64> {
    0i64..100_000i64
}

/// Strategy for strictly positive system quantities
pub fn positive_quantity_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000i64
}

/// Strategy for one counted line: `(system, actual)`
pub fn count_strategy() -> impl Strategy<Value = (i64, i64)> {
    (quantity_strategy(), quantity_strategy())
}

/// Strategy for a count plan of 1 to `max` lines
///
/// Product ids are derived from the position, so they never collide.
pub fn count_plan_strategy(max: usize) -> impl Strategy<Value = Vec<(String, i64, i64)>> {
    vec(count_strategy(), 1..=max).prop_map(|lines| {
        lines
            .into_iter()
            .enumerate()
            .map(|(n, (system, actual))| (format!("SKU-{:04}", n + 1), system, actual))
            .collect()
    })
}

/// Strategy for reason codes allowed on manual adjustments
pub fn manual_reason_strategy() -> impl Strategy<Value = ReasonCode> {
    prop_oneof![
        Just(ReasonCode::Damage),
        Just(ReasonCode::Expiry),
        Just(ReasonCode::ManualCorrection),
        Just(ReasonCode::Other),
    ]
}
