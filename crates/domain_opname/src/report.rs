//! Read models for reviewing completed counts

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AdjustmentId, OpnameId, ProductId};
use crate::adjustment::{AdjustmentRecord, ReasonCode};
use crate::discrepancy::{Discrepancy, SeverityBands};
use crate::session::OpnameSession;

/// One ledger entry with the product name resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentHistoryEntry {
    pub adjustment_id: AdjustmentId,
    pub product_id: ProductId,
    pub product_name: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub delta: i64,
    /// Delta relative to the previous quantity, in percent
    pub variance_percent: f64,
    pub reason_code: ReasonCode,
    pub reference_id: Option<String>,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
    pub performed_by: String,
}

impl AdjustmentHistoryEntry {
    pub fn new(record: AdjustmentRecord, product_name: impl Into<String>) -> Self {
        let discrepancy = Discrepancy::calculate(record.previous_quantity, record.new_quantity);
        Self {
            adjustment_id: record.id,
            product_id: record.product_id,
            product_name: product_name.into(),
            previous_quantity: record.previous_quantity,
            new_quantity: record.new_quantity,
            delta: record.delta,
            variance_percent: discrepancy.variance_percent,
            reason_code: record.reason_code,
            reference_id: record.reference_id,
            note: record.note,
            occurred_at: record.occurred_at,
            performed_by: record.performed_by,
        }
    }
}

/// A counted line of a completed session, classified by severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyRow {
    pub session_id: OpnameId,
    pub count_date: NaiveDate,
    pub product_id: ProductId,
    pub product_name: String,
    pub system_quantity: i64,
    pub actual_quantity: i64,
    pub variance: i64,
    pub variance_percent: f64,
    /// Name of the first matching band, if any
    pub severity: Option<String>,
    pub requires_approval: bool,
}

/// Discrepancies across completed sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub rows: Vec<DiscrepancyRow>,
}

impl DiscrepancyReport {
    /// Classifies every line item of the given sessions
    ///
    /// Products missing from `names` are shown by id.
    pub fn build(
        sessions: &[OpnameSession],
        bands: &SeverityBands,
        names: &HashMap<ProductId, String>,
    ) -> Self {
        let rows = sessions
            .iter()
            .flat_map(|session| {
                session.line_items.iter().map(move |item| (session, item))
            })
            .map(|(session, item)| {
                let discrepancy = item.discrepancy();
                let band = bands.classify_discrepancy(&discrepancy);
                DiscrepancyRow {
                    session_id: session.id,
                    count_date: session.count_date,
                    product_id: item.product_id.clone(),
                    product_name: names
                        .get(&item.product_id)
                        .cloned()
                        .unwrap_or_else(|| item.product_id.to_string()),
                    system_quantity: item.system_quantity,
                    actual_quantity: item.actual_quantity,
                    variance: discrepancy.variance,
                    variance_percent: discrepancy.variance_percent,
                    severity: band.map(|b| b.name.clone()),
                    requires_approval: band.is_some_and(|b| b.requires_approval),
                }
            })
            .collect();

        Self { rows }
    }

    /// Rows whose band requires a supervisor's sign-off
    pub fn requiring_approval(&self) -> impl Iterator<Item = &DiscrepancyRow> {
        self.rows.iter().filter(|row| row.requires_approval)
    }

    /// Rows in the named band
    pub fn in_band<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DiscrepancyRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.severity.as_deref() == Some(name))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
