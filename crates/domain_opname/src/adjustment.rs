//! Stock adjustment ledger
//!
//! Adjustment records are append-only: they are created once, inside the
//! same transaction as the stock write they document, and never updated or
//! deleted afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{AdjustmentId, ProductId};
use crate::error::OpnameError;
use crate::line_item::LineItem;
use crate::ports::OpnameTransaction;
use crate::session::OpnameSession;

/// Why a stock quantity was corrected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Correction produced by completing a stock opname
    CountReconciliation,
    /// Goods damaged
    Damage,
    /// Goods past expiry
    Expiry,
    /// Correction of a data entry mistake
    ManualCorrection,
    Other,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::CountReconciliation => "count_reconciliation",
            ReasonCode::Damage => "damage",
            ReasonCode::Expiry => "expiry",
            ReasonCode::ManualCorrection => "manual_correction",
            ReasonCode::Other => "other",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = OpnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count_reconciliation" => Ok(ReasonCode::CountReconciliation),
            "damage" => Ok(ReasonCode::Damage),
            "expiry" => Ok(ReasonCode::Expiry),
            "manual_correction" => Ok(ReasonCode::ManualCorrection),
            "other" => Ok(ReasonCode::Other),
            other => Err(OpnameError::validation(format!("unknown reason code: {other}"))),
        }
    }
}

/// An immutable ledger entry documenting one stock correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    /// Unique identifier
    pub id: AdjustmentId,
    /// Corrected product
    pub product_id: ProductId,
    /// Live quantity before the correction
    pub previous_quantity: i64,
    /// Live quantity after the correction
    pub new_quantity: i64,
    /// `new_quantity - previous_quantity`, never zero
    pub delta: i64,
    /// Cause of the correction
    pub reason_code: ReasonCode,
    /// Originating session id for count reconciliations
    pub reference_id: Option<String>,
    pub note: String,
    /// When the correction was applied
    pub occurred_at: DateTime<Utc>,
    /// Who applied it
    pub performed_by: String,
}

impl AdjustmentRecord {
    /// Builds a record, or `None` when the quantity does not change
    pub fn new(
        product_id: ProductId,
        previous_quantity: i64,
        new_quantity: i64,
        reason_code: ReasonCode,
        performed_by: impl Into<String>,
    ) -> Option<Self> {
        let delta = new_quantity - previous_quantity;
        if delta == 0 {
            return None;
        }

        Some(Self {
            id: AdjustmentId::new_v7(),
            product_id,
            previous_quantity,
            new_quantity,
            delta,
            reason_code,
            reference_id: None,
            note: String::new(),
            occurred_at: Utc::now(),
            performed_by: performed_by.into(),
        })
    }

    /// Sets the reference id
    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Sets the note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// Filter for reading the adjustment ledger
#[derive(Debug, Clone, Default)]
pub struct AdjustmentQuery {
    pub product_id: Option<ProductId>,
    pub reason_code: Option<ReasonCode>,
    /// Matches `reference_id` exactly
    pub reference_id: Option<String>,
    /// Inclusive lower bound on `occurred_at`
    pub occurred_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`
    pub occurred_to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl AdjustmentQuery {
    /// Count reconciliation records only
    pub fn reconciliations() -> Self {
        Self {
            reason_code: Some(ReasonCode::CountReconciliation),
            ..Default::default()
        }
    }

    /// Records produced by one session
    pub fn for_session(session_id: impl fmt::Display) -> Self {
        Self {
            reason_code: Some(ReasonCode::CountReconciliation),
            reference_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    /// Records touching one product
    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when the record satisfies every filter set on the query
    pub fn matches(&self, record: &AdjustmentRecord) -> bool {
        if let Some(ref product_id) = self.product_id {
            if &record.product_id != product_id {
                return false;
            }
        }
        if let Some(reason_code) = self.reason_code {
            if record.reason_code != reason_code {
                return false;
            }
        }
        if let Some(ref reference_id) = self.reference_id {
            if record.reference_id.as_ref() != Some(reference_id) {
                return false;
            }
        }
        if let Some(from) = self.occurred_from {
            if record.occurred_at < from {
                return false;
            }
        }
        if let Some(to) = self.occurred_to {
            if record.occurred_at > to {
                return false;
            }
        }
        true
    }
}

/// Persists adjustment records through an open transaction
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjustmentRecorder;

impl AdjustmentRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Records the correction a completed line item causes
    ///
    /// Returns `None` without writing when the quantities are equal.
    pub async fn record_reconciliation(
        &self,
        tx: &mut dyn OpnameTransaction,
        session: &OpnameSession,
        item: &LineItem,
        previous_quantity: i64,
        new_quantity: i64,
        performed_by: &str,
    ) -> Result<Option<AdjustmentRecord>, OpnameError> {
        let Some(record) = AdjustmentRecord::new(
            item.product_id.clone(),
            previous_quantity,
            new_quantity,
            ReasonCode::CountReconciliation,
            performed_by,
        ) else {
            return Ok(None);
        };

        let record = record
            .with_reference(session.id.to_string())
            .with_note(item.note.clone());
        self.append(tx, &record).await?;
        Ok(Some(record))
    }

    /// Records a correction that did not come from a count
    pub async fn record_manual(
        &self,
        tx: &mut dyn OpnameTransaction,
        product_id: &ProductId,
        previous_quantity: i64,
        new_quantity: i64,
        reason_code: ReasonCode,
        note: &str,
        performed_by: &str,
    ) -> Result<Option<AdjustmentRecord>, OpnameError> {
        if reason_code == ReasonCode::CountReconciliation {
            return Err(OpnameError::validation(
                "count reconciliation adjustments can only come from a completed stock opname",
            ));
        }
        let Some(record) = AdjustmentRecord::new(
            product_id.clone(),
            previous_quantity,
            new_quantity,
            reason_code,
            performed_by,
        ) else {
            return Ok(None);
        };

        let record = record.with_note(note);
        self.append(tx, &record).await?;
        Ok(Some(record))
    }

    async fn append(&self, tx: &mut dyn OpnameTransaction, record: &AdjustmentRecord) -> Result<(), OpnameError> {
        tx.insert_adjustment(record).await?;
        debug!(
            adjustment_id = %record.id,
            product_id = %record.product_id,
            delta = record.delta,
            reason = %record.reason_code,
            "Adjustment appended"
        );
        Ok(())
    }
}
