//! Line items of a count session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{LineItemId, OpnameId, ProductId};
use crate::discrepancy::Discrepancy;

/// One product being counted in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique identifier
    pub id: LineItemId,
    /// Session this line belongs to
    pub session_id: OpnameId,
    /// Product being counted
    pub product_id: ProductId,
    /// Live quantity snapshotted when the product was added
    pub system_quantity: i64,
    /// Physically counted quantity, 0 until recorded
    pub actual_quantity: i64,
    /// `actual_quantity - system_quantity`
    pub variance: i64,
    /// Variance in percent of the system quantity
    pub variance_percent: f64,
    /// Counter's note
    pub note: String,
    /// Who recorded the count
    pub recorded_by: Option<String>,
    /// When the count was last recorded; `None` while the line is untouched
    pub recorded_at: Option<DateTime<Utc>>,
    /// When the line was added
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    /// Creates an uncounted line with a snapshot of the live quantity
    pub fn new(session_id: OpnameId, product_id: ProductId, system_quantity: i64) -> Self {
        let discrepancy = Discrepancy::calculate(system_quantity, 0);
        Self {
            id: LineItemId::new_v7(),
            session_id,
            product_id,
            system_quantity,
            actual_quantity: 0,
            variance: discrepancy.variance,
            variance_percent: discrepancy.variance_percent,
            note: String::new(),
            recorded_by: None,
            recorded_at: None,
            created_at: Utc::now(),
        }
    }

    /// Records a physical count, replacing any earlier one
    pub fn record(&mut self, actual_quantity: i64, recorded_by: impl Into<String>, note: impl Into<String>) {
        self.actual_quantity = actual_quantity;
        self.note = note.into();
        self.recorded_by = Some(recorded_by.into());
        self.recorded_at = Some(Utc::now());
        self.refresh_discrepancy();
    }

    /// Recomputes variance figures from the two quantities
    pub fn refresh_discrepancy(&mut self) {
        let discrepancy = self.discrepancy();
        self.variance = discrepancy.variance;
        self.variance_percent = discrepancy.variance_percent;
    }

    /// Discrepancy derived from the current quantities
    pub fn discrepancy(&self) -> Discrepancy {
        Discrepancy::calculate(self.system_quantity, self.actual_quantity)
    }

    /// True once a count has been recorded, even a count of zero with no note
    pub fn is_recorded(&self) -> bool {
        self.recorded_at.is_some()
    }

    /// True when the recorded count differs from the snapshot
    pub fn has_variance(&self) -> bool {
        self.discrepancy().is_nonzero()
    }
}
