//! Custom Test Assertions
//!
//! Assertion helpers for opname types that give more meaningful messages
//! than bare `assert_eq!`.

use std::collections::HashMap;

use core_kernel::ProductId;
use domain_opname::{AdjustmentRecord, LineItem, OpnameSession, OpnameStatus, ReasonCode};

/// Asserts the variance of a line item and that it matches its quantities
pub fn assert_variance(item: &LineItem, expected: i64) {
    assert_eq!(
        item.variance, expected,
        "Variance mismatch for {}: system={}, actual={}",
        item.product_id, item.system_quantity, item.actual_quantity
    );
    assert_eq!(
        item.variance,
        item.actual_quantity - item.system_quantity,
        "Variance of {} is not actual - system",
        item.product_id
    );
}

/// Asserts a session's status and that `is_active` agrees with it
pub fn assert_status(session: &OpnameSession, expected: OpnameStatus) {
    assert_eq!(
        session.status, expected,
        "Expected session {} to be {}, got {}",
        session.id, expected, session.status
    );
    assert_eq!(
        session.is_active,
        !expected.is_terminal(),
        "Session {} in {} has is_active={}",
        session.id,
        expected,
        session.is_active
    );
}

/// Asserts that a ledger record is internally consistent
pub fn assert_record_consistent(record: &AdjustmentRecord) {
    assert_ne!(record.delta, 0, "Ledger holds a zero-delta record {}", record.id);
    assert_eq!(
        record.delta,
        record.new_quantity - record.previous_quantity,
        "Record {} delta does not equal new - previous",
        record.id
    );
}

/// Asserts that a completed session left exactly one reconciliation per
/// non-zero line item, each pointing back at the session
pub fn assert_reconciled(session: &OpnameSession, records: &[AdjustmentRecord]) {
    let reference = session.id.to_string();
    let own: Vec<&AdjustmentRecord> = records
        .iter()
        .filter(|r| r.reason_code == ReasonCode::CountReconciliation)
        .filter(|r| r.reference_id.as_deref() == Some(reference.as_str()))
        .collect();

    let expected: Vec<&LineItem> = session.line_items.iter().filter(|i| i.variance != 0).collect();
    assert_eq!(
        own.len(),
        expected.len(),
        "Expected {} reconciliation records for {}, found {}",
        expected.len(),
        session.id,
        own.len()
    );
    for item in expected {
        let record = own
            .iter()
            .find(|r| r.product_id == item.product_id)
            .unwrap_or_else(|| panic!("No reconciliation for {}", item.product_id));
        assert_record_consistent(record);
        assert_eq!(record.delta, item.variance, "Delta mismatch for {}", item.product_id);
    }
}

/// Asserts that per-product ledger deltas explain the stock movement
/// between two snapshots
pub fn assert_adjustments_balance(
    before: &HashMap<ProductId, i64>,
    after: &HashMap<ProductId, i64>,
    records: &[AdjustmentRecord],
) {
    let mut net: HashMap<&ProductId, i64> = HashMap::new();
    for record in records {
        *net.entry(&record.product_id).or_default() += record.delta;
    }

    for (product_id, quantity) in after {
        let previous = before.get(product_id).copied().unwrap_or(0);
        let delta = net.get(product_id).copied().unwrap_or(0);
        assert_eq!(
            previous + delta,
            *quantity,
            "Stock of {} moved from {} to {} but the ledger explains {}",
            product_id,
            previous,
            quantity,
            delta
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::OpnameFixtures;

    #[test]
    fn test_assert_variance_accepts_shortage() {
        let mut session = OpnameFixtures::started_with_items(&[("A", 100)]);
        let id = session.line_items[0].id;
        let item = session.record_count(id, 90, "counter", "").unwrap();
        assert_variance(item, -10);
    }

    #[test]
    #[should_panic(expected = "Variance mismatch")]
    fn test_assert_variance_rejects_wrong_value() {
        let session = OpnameFixtures::draft_with_items(&[("A", 5)]);
        assert_variance(&session.line_items[0], 0);
    }

    #[test]
    fn test_balance_with_no_movement() {
        let stock = HashMap::from([(ProductId::new("A"), 7)]);
        assert_adjustments_balance(&stock, &stock, &[]);
    }
}
