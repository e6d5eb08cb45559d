//! Opname session aggregate
//!
//! A session is the consistency boundary for one physical count. It owns its
//! line items and enforces the lifecycle:
//!
//! ```text
//! Draft ──start──▶ InProgress ──complete──▶ Completed
//!   │                  │
//!   └────cancel────────┴──────cancel──────▶ Canceled
//! ```
//!
//! # Invariants
//!
//! - Line items can only be added, removed or edited while in Draft
//! - A session cannot start without at least one line item
//! - A session cannot complete until every line item has been recorded
//! - Completed and Canceled are terminal and clear `is_active`

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{LineItemId, OpnameId, ProductId};
use crate::error::OpnameError;
use crate::line_item::LineItem;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpnameStatus {
    /// Being prepared; line items can be edited
    Draft,
    /// Counting underway
    InProgress,
    /// Reconciled into live stock
    Completed,
    /// Abandoned without touching stock
    Canceled,
}

impl OpnameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpnameStatus::Draft => "draft",
            OpnameStatus::InProgress => "in_progress",
            OpnameStatus::Completed => "completed",
            OpnameStatus::Canceled => "canceled",
        }
    }

    /// True for statuses with no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OpnameStatus::Completed | OpnameStatus::Canceled)
    }
}

impl fmt::Display for OpnameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpnameStatus {
    type Err = OpnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(OpnameStatus::Draft),
            "in_progress" => Ok(OpnameStatus::InProgress),
            "completed" => Ok(OpnameStatus::Completed),
            "canceled" => Ok(OpnameStatus::Canceled),
            other => Err(OpnameError::validation(format!("unknown opname status: {other}"))),
        }
    }
}

/// Kind of count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpnameCategory {
    /// Full periodic stock take
    #[default]
    Regular,
    /// Daily spot check
    Daily,
}

impl OpnameCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpnameCategory::Regular => "regular",
            OpnameCategory::Daily => "daily",
        }
    }
}

impl fmt::Display for OpnameCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpnameCategory {
    type Err = OpnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(OpnameCategory::Regular),
            "daily" => Ok(OpnameCategory::Daily),
            other => Err(OpnameError::validation(format!("unknown opname category: {other}"))),
        }
    }
}

/// A stock count session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpnameSession {
    /// Unique identifier
    pub id: OpnameId,
    /// Business date of the count
    pub count_date: NaiveDate,
    /// When counting started
    pub started_at: Option<DateTime<Utc>>,
    /// When the session reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: OpnameStatus,
    /// Kind of count
    pub category: OpnameCategory,
    /// False once terminal
    pub is_active: bool,
    /// Free-form notes
    pub notes: String,
    /// Creator
    pub created_by: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
    /// Line items in creation order
    pub line_items: Vec<LineItem>,
}

impl OpnameSession {
    /// Creates a new draft session
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` when the creator is blank.
    pub fn create(
        count_date: NaiveDate,
        notes: impl Into<String>,
        created_by: impl Into<String>,
        category: OpnameCategory,
    ) -> Result<Self, OpnameError> {
        let created_by = created_by.into();
        if created_by.trim().is_empty() {
            return Err(OpnameError::validation("created_by is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id: OpnameId::new_v7(),
            count_date,
            started_at: None,
            completed_at: None,
            status: OpnameStatus::Draft,
            category,
            is_active: true,
            notes: notes.into(),
            created_by,
            created_at: now,
            updated_at: now,
            line_items: Vec::new(),
        })
    }

    /// Edits the header of a draft
    pub fn update_header(&mut self, count_date: NaiveDate, notes: impl Into<String>) -> Result<(), OpnameError> {
        self.ensure_status("update", OpnameStatus::Draft)?;
        self.count_date = count_date;
        self.notes = notes.into();
        self.touch();
        Ok(())
    }

    /// Fails unless the session is a draft that may be deleted
    pub fn ensure_deletable(&self) -> Result<(), OpnameError> {
        self.ensure_status("delete", OpnameStatus::Draft)
    }

    /// Adds a product with its snapshotted system quantity
    ///
    /// # Errors
    ///
    /// `InvalidState` outside Draft, `ValidationFailed` if the product is
    /// already part of the session.
    pub fn add_line_item(&mut self, product_id: ProductId, system_quantity: i64) -> Result<&LineItem, OpnameError> {
        self.ensure_status("add items to", OpnameStatus::Draft)?;
        if product_id.is_empty() {
            return Err(OpnameError::validation("product_id is required"));
        }
        if self.contains_product(&product_id) {
            return Err(OpnameError::validation(format!(
                "product {} is already part of stock opname {}",
                product_id, self.id
            )));
        }

        self.line_items.push(LineItem::new(self.id, product_id, system_quantity));
        self.touch();
        let index = self.line_items.len() - 1;
        Ok(&self.line_items[index])
    }

    /// Removes a line item from a draft
    pub fn remove_line_item(&mut self, line_item_id: LineItemId) -> Result<LineItem, OpnameError> {
        self.ensure_status("remove items from", OpnameStatus::Draft)?;
        let position = self
            .line_items
            .iter()
            .position(|item| item.id == line_item_id)
            .ok_or_else(|| OpnameError::not_found("LineItem", line_item_id))?;
        self.touch();
        Ok(self.line_items.remove(position))
    }

    /// Moves a draft into counting
    pub fn start(&mut self) -> Result<(), OpnameError> {
        self.ensure_transition("start", OpnameStatus::InProgress)?;
        if self.line_items.is_empty() {
            return Err(OpnameError::validation(format!(
                "stock opname {} has no line items to count",
                self.id
            )));
        }

        let now = Utc::now();
        self.status = OpnameStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Records the counted quantity of one line item
    ///
    /// Repeatable while counting; the latest call wins.
    pub fn record_count(
        &mut self,
        line_item_id: LineItemId,
        actual_quantity: i64,
        recorded_by: impl Into<String>,
        note: impl Into<String>,
    ) -> Result<&LineItem, OpnameError> {
        self.ensure_status("record counts in", OpnameStatus::InProgress)?;
        if actual_quantity < 0 {
            return Err(OpnameError::validation("actual quantity must not be negative"));
        }
        let recorded_by = recorded_by.into();
        if recorded_by.trim().is_empty() {
            return Err(OpnameError::validation("recorded_by is required"));
        }

        let index = self
            .line_items
            .iter()
            .position(|item| item.id == line_item_id)
            .ok_or_else(|| OpnameError::not_found("LineItem", line_item_id))?;
        self.line_items[index].record(actual_quantity, recorded_by, note);
        self.touch();
        Ok(&self.line_items[index])
    }

    /// Checks that the session may complete, without changing it
    pub fn ensure_completable(&self) -> Result<(), OpnameError> {
        self.ensure_transition("complete", OpnameStatus::Completed)?;
        let pending: Vec<String> = self
            .line_items
            .iter()
            .filter(|item| !item.is_recorded())
            .map(|item| item.product_id.to_string())
            .collect();
        if !pending.is_empty() {
            return Err(OpnameError::validation(format!(
                "stock opname {} has unrecorded line items: {}",
                self.id,
                pending.join(", ")
            )));
        }
        Ok(())
    }

    /// Marks the session completed
    pub fn complete(&mut self) -> Result<(), OpnameError> {
        self.ensure_completable()?;
        self.close(OpnameStatus::Completed);
        Ok(())
    }

    /// Cancels a draft or an in-progress count
    pub fn cancel(&mut self) -> Result<(), OpnameError> {
        self.ensure_transition("cancel", OpnameStatus::Canceled)?;
        self.close(OpnameStatus::Canceled);
        Ok(())
    }

    /// Line items whose count differs from the snapshot
    pub fn nonzero_variance_items(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(|item| item.has_variance())
    }

    /// Finds a line item by id
    pub fn line_item(&self, line_item_id: LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id == line_item_id)
    }

    pub fn contains_product(&self, product_id: &ProductId) -> bool {
        self.line_items.iter().any(|item| &item.product_id == product_id)
    }

    /// Checks if transition is valid
    pub fn can_transition_to(&self, target: OpnameStatus) -> bool {
        use OpnameStatus::*;
        matches!(
            (self.status, target),
            (Draft, InProgress) |
            (InProgress, Completed) |
            (Draft, Canceled) |
            (InProgress, Canceled)
        )
    }

    fn ensure_transition(&self, operation: &'static str, target: OpnameStatus) -> Result<(), OpnameError> {
        if !self.can_transition_to(target) {
            return Err(OpnameError::invalid_state(operation, self.status));
        }
        Ok(())
    }

    fn ensure_status(&self, operation: &'static str, expected: OpnameStatus) -> Result<(), OpnameError> {
        if self.status != expected {
            return Err(OpnameError::invalid_state(operation, self.status));
        }
        Ok(())
    }

    fn close(&mut self, status: OpnameStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.is_active = false;
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft() -> OpnameSession {
        OpnameSession::create(
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            "month end",
            "supervisor",
            OpnameCategory::Regular,
        )
        .unwrap()
    }

    fn in_progress(items: &[(&str, i64)]) -> OpnameSession {
        let mut session = draft();
        for (product, qty) in items {
            session.add_line_item(ProductId::new(*product), *qty).unwrap();
        }
        session.start().unwrap();
        session
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn test_create_requires_creator() {
        let result = OpnameSession::create(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "",
            "  ",
            OpnameCategory::Daily,
        );
        assert!(result.unwrap_err().is_validation());
    }

    #[test]
    fn test_new_draft_is_active_and_empty() {
        let session = draft();
        assert_eq!(session.status, OpnameStatus::Draft);
        assert!(session.is_active);
        assert!(session.line_items.is_empty());
        assert!(session.started_at.is_none());
    }

    #[test]
    fn test_start_requires_items() {
        let mut session = draft();
        assert!(session.start().unwrap_err().is_validation());
        assert_eq!(session.status, OpnameStatus::Draft);

        session.add_line_item(ProductId::new("P1"), 10).unwrap();
        session.start().unwrap();
        assert_eq!(session.status, OpnameStatus::InProgress);
        assert!(session.started_at.is_some());
    }

    #[test]
    fn test_start_twice_is_invalid_state() {
        let mut session = in_progress(&[("P1", 1)]);
        assert!(session.start().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_complete_requires_every_item_recorded() {
        let mut session = in_progress(&[("P1", 100), ("P2", 50)]);
        let p1 = session.line_items[0].id;
        session.record_count(p1, 90, "counter", "").unwrap();

        let error = session.complete().unwrap_err();
        assert!(error.is_validation());
        assert!(error.to_string().contains("P2"));
        assert_eq!(session.status, OpnameStatus::InProgress);
    }

    #[test]
    fn test_complete_marks_inactive() {
        let mut session = in_progress(&[("P1", 100)]);
        let p1 = session.line_items[0].id;
        session.record_count(p1, 100, "counter", "").unwrap();
        session.complete().unwrap();

        assert_eq!(session.status, OpnameStatus::Completed);
        assert!(!session.is_active);
        assert!(session.completed_at.is_some());
    }

    #[test]
    fn test_cancel_from_draft_and_in_progress() {
        let mut a = draft();
        a.cancel().unwrap();
        assert_eq!(a.status, OpnameStatus::Canceled);
        assert!(!a.is_active);

        let mut b = in_progress(&[("P1", 5)]);
        b.cancel().unwrap();
        assert_eq!(b.status, OpnameStatus::Canceled);
        assert!(b.cancel().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_terminal_sessions_reject_everything() {
        let mut session = draft();
        session.cancel().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        assert!(session.update_header(date, "x").unwrap_err().is_invalid_state());
        assert!(session.add_line_item(ProductId::new("P1"), 1).unwrap_err().is_invalid_state());
        assert!(session.start().unwrap_err().is_invalid_state());
        assert!(session.complete().unwrap_err().is_invalid_state());
        assert!(session.ensure_deletable().unwrap_err().is_invalid_state());
    }

    // ========================================================================
    // Line items
    // ========================================================================

    #[test]
    fn test_duplicate_product_rejected() {
        let mut session = draft();
        session.add_line_item(ProductId::new("P1"), 10).unwrap();
        let error = session.add_line_item(ProductId::new(" P1 "), 10).unwrap_err();
        assert!(error.is_validation());
        assert_eq!(session.line_items.len(), 1);
    }

    #[test]
    fn test_remove_line_item() {
        let mut session = draft();
        let id = session.add_line_item(ProductId::new("P1"), 10).unwrap().id;
        session.add_line_item(ProductId::new("P2"), 20).unwrap();

        let removed = session.remove_line_item(id).unwrap();
        assert_eq!(removed.product_id.as_str(), "P1");
        assert_eq!(session.line_items.len(), 1);
        assert!(session.remove_line_item(id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_items_frozen_once_started() {
        let mut session = in_progress(&[("P1", 10)]);
        let id = session.line_items[0].id;
        assert!(session.remove_line_item(id).unwrap_err().is_invalid_state());
        assert!(session.add_line_item(ProductId::new("P2"), 1).unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_record_count_only_in_progress() {
        let mut session = draft();
        let id = session.add_line_item(ProductId::new("P1"), 10).unwrap().id;
        assert!(session.record_count(id, 5, "c", "").unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_record_count_rejects_negative_and_unknown() {
        let mut session = in_progress(&[("P1", 10)]);
        let id = session.line_items[0].id;
        assert!(session.record_count(id, -1, "c", "").unwrap_err().is_validation());
        assert!(session
            .record_count(LineItemId::new(), 1, "c", "")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_nonzero_variance_items() {
        let mut session = in_progress(&[("P1", 100), ("P2", 50)]);
        let (p1, p2) = (session.line_items[0].id, session.line_items[1].id);
        session.record_count(p1, 90, "c", "").unwrap();
        session.record_count(p2, 50, "c", "").unwrap();

        let affected: Vec<_> = session.nonzero_variance_items().collect();
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].variance, -10);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            OpnameStatus::Draft,
            OpnameStatus::InProgress,
            OpnameStatus::Completed,
            OpnameStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<OpnameStatus>().unwrap(), status);
        }
        assert!("open".parse::<OpnameStatus>().is_err());
    }

    proptest! {
        #[test]
        fn recording_same_value_twice_is_stable(system in 0i64..1_000, actual in 0i64..1_000) {
            let mut session = in_progress(&[("P1", system)]);
            let id = session.line_items[0].id;
            let first = session.record_count(id, actual, "c", "").unwrap().variance;
            let second = session.record_count(id, actual, "c", "").unwrap().variance;
            prop_assert_eq!(first, second);
            prop_assert_eq!(second, actual - system);
        }

        #[test]
        fn only_forward_transitions(steps in proptest::collection::vec(0u8..4, 0..8)) {
            let mut session = draft();
            session.add_line_item(ProductId::new("P1"), 3).unwrap();
            let id = session.line_items[0].id;
            for step in steps {
                let before = session.status;
                let _ = match step {
                    0 => session.start(),
                    1 => session.record_count(id, 3, "c", "").map(|_| ()),
                    2 => session.complete(),
                    _ => session.cancel(),
                };
                if before.is_terminal() {
                    prop_assert_eq!(session.status, before);
                }
            }
        }
    }
}
