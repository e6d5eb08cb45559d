//! Opname workflow service
//!
//! `OpnameService` exposes the use cases of a stock count. Each mutating use
//! case runs in one store transaction: guards are evaluated on the locked
//! session before anything is written, and completion applies every ledger
//! entry, stock write and the status change as a single unit.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{LineItemId, OpnameId, PortError, ProductId};

use crate::adjustment::{AdjustmentQuery, AdjustmentRecord, AdjustmentRecorder, ReasonCode};
use crate::discrepancy::SeverityBands;
use crate::error::OpnameError;
use crate::line_item::LineItem;
use crate::ports::{OpnameStore, ProductCatalog, SessionQuery};
use crate::report::{AdjustmentHistoryEntry, DiscrepancyReport};
use crate::session::{OpnameCategory, OpnameSession, OpnameStatus};

/// How completion changes live stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockWritePolicy {
    /// Live quantity becomes the counted quantity
    #[default]
    Overwrite,
    /// The signed variance is added to the live quantity read at completion
    ApplyDelta,
}

/// Tunables of the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOptions {
    #[serde(default)]
    pub stock_write_policy: StockWritePolicy,
    /// Category given to drafts created without one
    #[serde(default)]
    pub default_category: OpnameCategory,
}

/// A stock correction outside of a count
#[derive(Debug, Clone)]
pub struct ManualAdjustment {
    pub product_id: ProductId,
    pub new_quantity: i64,
    pub reason_code: ReasonCode,
    pub note: String,
    pub performed_by: String,
}

/// Result of completing a session
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    /// The session in Completed status
    pub session: OpnameSession,
    /// One record per line item whose count differed
    pub adjustments: Vec<AdjustmentRecord>,
}

/// Application service for stock opname workflows
pub struct OpnameService {
    store: Arc<dyn OpnameStore>,
    catalog: Arc<dyn ProductCatalog>,
    recorder: AdjustmentRecorder,
    options: ServiceOptions,
}

impl OpnameService {
    /// Creates a service with default options
    pub fn new(store: Arc<dyn OpnameStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            store,
            catalog,
            recorder: AdjustmentRecorder::new(),
            options: ServiceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    // ========================================================================
    // Drafts
    // ========================================================================

    /// Creates a draft in the default category
    pub async fn create_draft(
        &self,
        count_date: NaiveDate,
        notes: &str,
        created_by: &str,
    ) -> Result<OpnameSession, OpnameError> {
        self.create_draft_with_category(count_date, notes, created_by, self.options.default_category)
            .await
    }

    /// Creates a draft
    #[instrument(skip(self, notes), fields(count_date = %count_date, category = %category))]
    pub async fn create_draft_with_category(
        &self,
        count_date: NaiveDate,
        notes: &str,
        created_by: &str,
        category: OpnameCategory,
    ) -> Result<OpnameSession, OpnameError> {
        let session = OpnameSession::create(count_date, notes, created_by, category)?;

        let mut tx = self.store.begin().await?;
        tx.insert_session(&session).await?;
        tx.commit().await?;

        info!(session_id = %session.id, "Stock opname draft created");
        Ok(session)
    }

    /// Edits the count date and notes of a draft
    #[instrument(skip(self, notes), fields(session_id = %id))]
    pub async fn update_draft(
        &self,
        id: OpnameId,
        count_date: NaiveDate,
        notes: &str,
    ) -> Result<OpnameSession, OpnameError> {
        let mut tx = self.store.begin().await?;
        let mut session = tx.lock_session(id).await?;
        session.update_header(count_date, notes).inspect_err(reject)?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        debug!("Stock opname draft updated");
        Ok(session)
    }

    /// Deletes a draft together with its line items
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn delete_draft(&self, id: OpnameId) -> Result<(), OpnameError> {
        let mut tx = self.store.begin().await?;
        let session = tx.lock_session(id).await?;
        session.ensure_deletable().inspect_err(reject)?;
        tx.delete_session(id).await?;
        tx.commit().await?;

        info!("Stock opname draft deleted");
        Ok(())
    }

    /// Fetches a session that is still a draft
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn get_draft(&self, id: OpnameId) -> Result<OpnameSession, OpnameError> {
        let session = self.store.get_session(id).await?;
        if session.status != OpnameStatus::Draft {
            return Err(OpnameError::invalid_state("edit", session.status)).inspect_err(reject);
        }
        Ok(session)
    }

    // ========================================================================
    // Line items
    // ========================================================================

    /// Adds a product to a draft, snapshotting its live quantity
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn add_line_item(
        &self,
        session_id: OpnameId,
        product_id: ProductId,
    ) -> Result<LineItem, OpnameError> {
        if product_id.is_empty() {
            return Err(OpnameError::validation("product_id is required")).inspect_err(reject);
        }
        if !self.catalog.exists(&product_id).await? {
            return Err(OpnameError::not_found("Product", &product_id)).inspect_err(reject);
        }

        let mut tx = self.store.begin().await?;
        let mut session = tx.lock_session(session_id).await?;
        let system_quantity = tx.read_quantity(&product_id).await?;
        let item = session
            .add_line_item(product_id, system_quantity)
            .inspect_err(reject)?
            .clone();
        tx.insert_line_item(&item).await?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        debug!(line_item_id = %item.id, system_quantity, "Line item added");
        Ok(item)
    }

    /// Removes a line item from a draft
    #[instrument(skip(self), fields(session_id = %session_id, line_item_id = %line_item_id))]
    pub async fn remove_line_item(
        &self,
        session_id: OpnameId,
        line_item_id: LineItemId,
    ) -> Result<(), OpnameError> {
        let mut tx = self.store.begin().await?;
        let mut session = tx.lock_session(session_id).await?;
        session.remove_line_item(line_item_id).inspect_err(reject)?;
        tx.delete_line_item(line_item_id).await?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        debug!("Line item removed");
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Moves a draft into counting
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn start(&self, session_id: OpnameId, started_by: &str) -> Result<OpnameSession, OpnameError> {
        let mut tx = self.store.begin().await?;
        let mut session = tx.lock_session(session_id).await?;
        session.start().inspect_err(reject)?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        info!(items = session.line_items.len(), "Stock opname started");
        Ok(session)
    }

    /// Records the physical count of one line item
    #[instrument(skip(self, note), fields(line_item_id = %line_item_id))]
    pub async fn record_count(
        &self,
        line_item_id: LineItemId,
        actual_quantity: i64,
        recorded_by: &str,
        note: &str,
    ) -> Result<LineItem, OpnameError> {
        let mut tx = self.store.begin().await?;
        let located = tx.find_line_item(line_item_id).await?;
        let mut session = tx.lock_session(located.session_id).await?;
        let item = session
            .record_count(line_item_id, actual_quantity, recorded_by, note)
            .inspect_err(reject)?
            .clone();
        tx.update_line_item(&item).await?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        debug!(
            variance = item.variance,
            variance_percent = item.variance_percent,
            "Count recorded"
        );
        Ok(item)
    }

    /// Completes a count and reconciles live stock
    ///
    /// For every line item whose count differs from its snapshot, one
    /// count-reconciliation record is appended and the live quantity is
    /// written according to the configured [`StockWritePolicy`]. All of it
    /// commits together with the status change or not at all.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is in progress
    /// - `ValidationFailed` if `completed_by` is blank, if a line item was
    ///   never recorded, or if applying a delta would drive stock negative
    /// - `PersistenceFailed` if any write fails; nothing is kept
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn complete(&self, session_id: OpnameId, completed_by: &str) -> Result<CompletionOutcome, OpnameError> {
        if completed_by.trim().is_empty() {
            return Err(OpnameError::validation("completed_by is required")).inspect_err(reject);
        }
        let mut tx = self.store.begin().await?;
        let mut session = tx.lock_session(session_id).await?;
        session.ensure_completable().inspect_err(reject)?;

        let affected: Vec<LineItem> = session.nonzero_variance_items().cloned().collect();
        let mut adjustments = Vec::with_capacity(affected.len());
        for item in &affected {
            let (previous, new) = match self.options.stock_write_policy {
                StockWritePolicy::Overwrite => (item.system_quantity, item.actual_quantity),
                StockWritePolicy::ApplyDelta => {
                    let live = tx.read_quantity(&item.product_id).await?;
                    match live.checked_add(item.variance) {
                        Some(new) if new >= 0 => (live, new),
                        _ => {
                            return Err(OpnameError::validation(format!(
                                "applying variance {} to product {} at {} units is out of range",
                                item.variance, item.product_id, live
                            )))
                            .inspect_err(reject);
                        }
                    }
                }
            };

            let record = self
                .recorder
                .record_reconciliation(&mut *tx, &session, item, previous, new, completed_by)
                .await?;
            tx.write_quantity(&item.product_id, new).await?;
            adjustments.extend(record);
        }

        session.complete()?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        info!(
            adjustments = adjustments.len(),
            net_delta = adjustments.iter().map(|a| a.delta).sum::<i64>(),
            "Stock opname completed"
        );
        Ok(CompletionOutcome { session, adjustments })
    }

    /// Cancels a draft or an in-progress count without touching stock
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn cancel(&self, session_id: OpnameId, canceled_by: &str) -> Result<OpnameSession, OpnameError> {
        let mut tx = self.store.begin().await?;
        let mut session = tx.lock_session(session_id).await?;
        session.cancel().inspect_err(reject)?;
        tx.update_session(&session).await?;
        tx.commit().await?;

        info!("Stock opname canceled");
        Ok(session)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Retrieves a session with its line items
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_session(&self, session_id: OpnameId) -> Result<OpnameSession, OpnameError> {
        Ok(self.store.get_session(session_id).await?)
    }

    /// Lists sessions matching the query, newest count date first
    #[instrument(skip(self))]
    pub async fn list_sessions(&self, query: SessionQuery) -> Result<Vec<OpnameSession>, OpnameError> {
        let sessions = self.store.find_sessions(query).await?;
        debug!(count = sessions.len(), "Sessions listed");
        Ok(sessions)
    }

    // ========================================================================
    // Ledger
    // ========================================================================

    /// Corrects a live quantity outside of a count
    ///
    /// Returns `None` without writing anything when the quantity is already
    /// at the requested value.
    #[instrument(skip(self, adjustment), fields(product_id = %adjustment.product_id, reason = %adjustment.reason_code))]
    pub async fn adjust_stock(&self, adjustment: ManualAdjustment) -> Result<Option<AdjustmentRecord>, OpnameError> {
        if adjustment.new_quantity < 0 {
            return Err(OpnameError::validation("stock quantity must not be negative")).inspect_err(reject);
        }
        if adjustment.performed_by.trim().is_empty() {
            return Err(OpnameError::validation("performed_by is required")).inspect_err(reject);
        }
        if !self.catalog.exists(&adjustment.product_id).await? {
            return Err(OpnameError::not_found("Product", &adjustment.product_id)).inspect_err(reject);
        }

        let mut tx = self.store.begin().await?;
        let previous = tx.read_quantity(&adjustment.product_id).await?;
        let record = self
            .recorder
            .record_manual(
                &mut *tx,
                &adjustment.product_id,
                previous,
                adjustment.new_quantity,
                adjustment.reason_code,
                &adjustment.note,
                &adjustment.performed_by,
            )
            .await
            .inspect_err(reject)?;

        let Some(record) = record else {
            debug!("Quantity unchanged, nothing to adjust");
            return Ok(None);
        };
        tx.write_quantity(&adjustment.product_id, adjustment.new_quantity).await?;
        tx.commit().await?;

        info!(delta = record.delta, "Stock adjusted");
        Ok(Some(record))
    }

    /// Reads the ledger with product names, newest first
    ///
    /// A query without a reason code returns count reconciliations only.
    #[instrument(skip(self))]
    pub async fn adjustment_history(&self, mut query: AdjustmentQuery) -> Result<Vec<AdjustmentHistoryEntry>, OpnameError> {
        if query.reason_code.is_none() {
            query.reason_code = Some(ReasonCode::CountReconciliation);
        }
        let records = self.store.find_adjustments(query).await?;

        let products: Vec<ProductId> = records.iter().map(|r| r.product_id.clone()).collect();
        let names = self.product_names(products).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let name = names
                    .get(&record.product_id)
                    .cloned()
                    .unwrap_or_else(|| record.product_id.to_string());
                AdjustmentHistoryEntry::new(record, name)
            })
            .collect())
    }

    /// Classifies the line items of completed sessions by severity
    ///
    /// The query's status filter is ignored; only completed sessions count.
    #[instrument(skip(self, bands, query))]
    pub async fn discrepancy_report(
        &self,
        bands: &SeverityBands,
        query: SessionQuery,
    ) -> Result<DiscrepancyReport, OpnameError> {
        let query = SessionQuery {
            status: Some(OpnameStatus::Completed),
            ..query
        };
        let sessions = self.store.find_sessions(query).await?;

        let products: Vec<ProductId> = sessions
            .iter()
            .flat_map(|s| s.line_items.iter().map(|i| i.product_id.clone()))
            .collect();
        let names = self.product_names(products).await?;
        let report = DiscrepancyReport::build(&sessions, bands, &names);

        debug!(
            rows = report.rows.len(),
            flagged = report.requiring_approval().count(),
            "Discrepancy report built"
        );
        Ok(report)
    }

    /// Resolves display names, skipping products the catalog no longer knows
    async fn product_names(&self, products: Vec<ProductId>) -> Result<HashMap<ProductId, String>, OpnameError> {
        let mut names = HashMap::new();
        for product_id in products {
            if names.contains_key(&product_id) {
                continue;
            }
            match self.catalog.name(&product_id).await {
                Ok(name) => {
                    names.insert(product_id, name);
                }
                Err(PortError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(names)
    }
}

fn reject(error: &OpnameError) {
    warn!(%error, "Request rejected");
}
