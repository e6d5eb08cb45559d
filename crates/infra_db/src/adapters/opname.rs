//! PostgreSQL Opname Adapter
//!
//! Implements the opname domain ports on PostgreSQL through the
//! `OpnameRepository`.
//!
//! # Overview
//!
//! - `PostgresOpnameStore` implements `OpnameStore` and `ProductCatalog`
//! - `PgOpnameTransaction` wraps a `sqlx::Transaction`; the session row is
//!   locked with `SELECT ... FOR UPDATE` and product rows are locked when
//!   their quantity is read
//!
//! A `PgOpnameTransaction` that is dropped without `commit` is rolled back
//! by sqlx when the underlying connection returns to the pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresOpnameStore;
//! use domain_opname::OpnameService;
//! use std::sync::Arc;
//!
//! let store = Arc::new(PostgresOpnameStore::new(pool));
//! let service = OpnameService::new(store.clone(), store);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, AdjustmentId, DomainPort, HealthCheckResult, HealthCheckable, LineItemId,
    OpnameId, PortError, ProductId,
};
use domain_opname::{
    AdjustmentQuery, AdjustmentRecord, LineItem, OpnameCategory, OpnameSession, OpnameStatus,
    OpnameStore, OpnameTransaction, ProductCatalog, ReasonCode, SessionQuery, StockLedger,
};

use crate::error::DatabaseError;
use crate::repositories::opname::{
    AdjustmentFilter, AdjustmentReason as DbAdjustmentReason, AdjustmentRow, LineItemRow,
    OpnameCategory as DbOpnameCategory, OpnameRepository, OpnameStatus as DbOpnameStatus,
    SessionFilter, SessionRow,
};

/// PostgreSQL-backed opname store and product catalog
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - `DatabaseError::DuplicateEntry` -> `PortError::Conflict`
/// - Other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresOpnameStore {
    repository: OpnameRepository,
    pool: PgPool,
}

impl PostgresOpnameStore {
    /// Creates a new PostgreSQL opname store
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: OpnameRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &OpnameRepository {
        &self.repository
    }

    async fn attach_line_items(&self, rows: Vec<SessionRow>) -> Result<Vec<OpnameSession>, DatabaseError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.session_id).collect();
        let mut items_by_session: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for item in self.repository.line_items_for(&ids).await? {
            items_by_session
                .entry(item.session_id)
                .or_default()
                .push(row_to_line_item(item));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items_by_session.remove(&row.session_id).unwrap_or_default();
                row_to_session(row, items)
            })
            .collect())
    }
}

impl DomainPort for PostgresOpnameStore {}

#[async_trait]
impl HealthCheckable for PostgresOpnameStore {
    /// Checks database connectivity with a `SELECT 1`
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: "postgres-opname-store".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl OpnameStore for PostgresOpnameStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn OpnameTransaction>, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Ok(Box::new(PgOpnameTransaction { tx: Some(tx) }))
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn get_session(&self, id: OpnameId) -> Result<OpnameSession, PortError> {
        debug!("Fetching stock opname");
        let row = self.repository.get_session(*id.as_uuid()).await?;
        let mut sessions = self.attach_line_items(vec![row]).await?;
        sessions
            .pop()
            .ok_or_else(|| PortError::not_found("OpnameSession", id))
    }

    #[instrument(skip(self))]
    async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<OpnameSession>, PortError> {
        debug!("Finding stock opnames with query: {:?}", query);
        let filter = SessionFilter {
            status: query.status.map(domain_to_db_status),
            date_from: query.date_from,
            date_to: query.date_to,
            session_id: query.session_id.map(Uuid::from),
            limit: query.limit.map(i64::from),
        };
        let rows = self.repository.find_sessions(&filter).await?;
        Ok(self.attach_line_items(rows).await?)
    }

    #[instrument(skip(self))]
    async fn find_adjustments(&self, query: AdjustmentQuery) -> Result<Vec<AdjustmentRecord>, PortError> {
        debug!("Reading adjustment ledger with query: {:?}", query);
        let filter = AdjustmentFilter {
            product_id: query.product_id.map(|p| p.to_string()),
            reason_code: query.reason_code.map(domain_to_db_reason),
            reference_id: query.reference_id,
            occurred_from: query.occurred_from,
            occurred_to: query.occurred_to,
            limit: query.limit.map(i64::from),
        };
        let rows = self.repository.find_adjustments(&filter).await?;
        Ok(rows.into_iter().map(row_to_adjustment).collect())
    }
}

#[async_trait]
impl ProductCatalog for PostgresOpnameStore {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn exists(&self, product_id: &ProductId) -> Result<bool, PortError> {
        Ok(self.repository.find_product(product_id.as_str()).await?.is_some())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn name(&self, product_id: &ProductId) -> Result<String, PortError> {
        self.repository
            .find_product(product_id.as_str())
            .await?
            .map(|row| row.name)
            .ok_or_else(|| PortError::not_found("Product", product_id))
    }
}

/// An open PostgreSQL transaction
pub struct PgOpnameTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgOpnameTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, PortError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| PortError::internal("transaction already committed"))
    }
}

#[async_trait]
impl StockLedger for PgOpnameTransaction {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn read_quantity(&mut self, product_id: &ProductId) -> Result<i64, PortError> {
        Ok(OpnameRepository::read_quantity(self.conn()?, product_id.as_str()).await?)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn write_quantity(&mut self, product_id: &ProductId, quantity: i64) -> Result<(), PortError> {
        Ok(OpnameRepository::write_quantity(self.conn()?, product_id.as_str(), quantity).await?)
    }
}

#[async_trait]
impl OpnameTransaction for PgOpnameTransaction {
    async fn insert_session(&mut self, session: &OpnameSession) -> Result<(), PortError> {
        Ok(OpnameRepository::insert_session(self.conn()?, &session_to_row(session)).await?)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn lock_session(&mut self, id: OpnameId) -> Result<OpnameSession, PortError> {
        let conn = self.conn()?;
        let row = OpnameRepository::lock_session(&mut *conn, *id.as_uuid()).await?;
        let items = OpnameRepository::session_line_items(&mut *conn, *id.as_uuid())
            .await?
            .into_iter()
            .map(row_to_line_item)
            .collect();
        Ok(row_to_session(row, items))
    }

    async fn update_session(&mut self, session: &OpnameSession) -> Result<(), PortError> {
        Ok(OpnameRepository::update_session(self.conn()?, &session_to_row(session)).await?)
    }

    async fn delete_session(&mut self, id: OpnameId) -> Result<(), PortError> {
        Ok(OpnameRepository::delete_session(self.conn()?, *id.as_uuid()).await?)
    }

    async fn find_line_item(&mut self, id: LineItemId) -> Result<LineItem, PortError> {
        let row = OpnameRepository::find_line_item(self.conn()?, *id.as_uuid()).await?;
        Ok(row_to_line_item(row))
    }

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<(), PortError> {
        Ok(OpnameRepository::insert_line_item(self.conn()?, &line_item_to_row(item)).await?)
    }

    async fn update_line_item(&mut self, item: &LineItem) -> Result<(), PortError> {
        Ok(OpnameRepository::update_line_item(self.conn()?, &line_item_to_row(item)).await?)
    }

    async fn delete_line_item(&mut self, id: LineItemId) -> Result<(), PortError> {
        Ok(OpnameRepository::delete_line_item(self.conn()?, *id.as_uuid()).await?)
    }

    async fn insert_adjustment(&mut self, record: &AdjustmentRecord) -> Result<(), PortError> {
        Ok(OpnameRepository::insert_adjustment(self.conn()?, &adjustment_to_row(record)).await?)
    }

    #[instrument(skip(self))]
    async fn commit(&mut self) -> Result<(), PortError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| PortError::internal("transaction already committed"))?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        debug!("Transaction committed");
        Ok(())
    }
}

// ============================================================================
// Row <-> domain mapping
// ============================================================================

fn session_to_row(session: &OpnameSession) -> SessionRow {
    SessionRow {
        session_id: *session.id.as_uuid(),
        count_date: session.count_date,
        started_at: session.started_at,
        completed_at: session.completed_at,
        status: domain_to_db_status(session.status),
        category: domain_to_db_category(session.category),
        is_active: session.is_active,
        notes: session.notes.clone(),
        created_by: session.created_by.clone(),
        created_at: session.created_at,
        updated_at: session.updated_at,
    }
}

fn row_to_session(row: SessionRow, line_items: Vec<LineItem>) -> OpnameSession {
    OpnameSession {
        id: OpnameId::from(row.session_id),
        count_date: row.count_date,
        started_at: row.started_at,
        completed_at: row.completed_at,
        status: db_to_domain_status(row.status),
        category: db_to_domain_category(row.category),
        is_active: row.is_active,
        notes: row.notes,
        created_by: row.created_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
        line_items,
    }
}

fn line_item_to_row(item: &LineItem) -> LineItemRow {
    LineItemRow {
        line_item_id: *item.id.as_uuid(),
        session_id: *item.session_id.as_uuid(),
        product_id: item.product_id.to_string(),
        system_quantity: item.system_quantity,
        actual_quantity: item.actual_quantity,
        variance: item.variance,
        variance_percent: item.variance_percent,
        note: item.note.clone(),
        recorded_by: item.recorded_by.clone(),
        recorded_at: item.recorded_at,
        created_at: item.created_at,
    }
}

fn row_to_line_item(row: LineItemRow) -> LineItem {
    LineItem {
        id: LineItemId::from(row.line_item_id),
        session_id: OpnameId::from(row.session_id),
        product_id: ProductId::new(row.product_id),
        system_quantity: row.system_quantity,
        actual_quantity: row.actual_quantity,
        variance: row.variance,
        variance_percent: row.variance_percent,
        note: row.note,
        recorded_by: row.recorded_by,
        recorded_at: row.recorded_at,
        created_at: row.created_at,
    }
}

fn adjustment_to_row(record: &AdjustmentRecord) -> AdjustmentRow {
    AdjustmentRow {
        adjustment_id: *record.id.as_uuid(),
        product_id: record.product_id.to_string(),
        previous_quantity: record.previous_quantity,
        new_quantity: record.new_quantity,
        delta: record.delta,
        reason_code: domain_to_db_reason(record.reason_code),
        reference_id: record.reference_id.clone(),
        note: record.note.clone(),
        occurred_at: record.occurred_at,
        performed_by: record.performed_by.clone(),
    }
}

fn row_to_adjustment(row: AdjustmentRow) -> AdjustmentRecord {
    AdjustmentRecord {
        id: AdjustmentId::from(row.adjustment_id),
        product_id: ProductId::new(row.product_id),
        previous_quantity: row.previous_quantity,
        new_quantity: row.new_quantity,
        delta: row.delta,
        reason_code: db_to_domain_reason(row.reason_code),
        reference_id: row.reference_id,
        note: row.note,
        occurred_at: row.occurred_at,
        performed_by: row.performed_by,
    }
}

fn domain_to_db_status(status: OpnameStatus) -> DbOpnameStatus {
    match status {
        OpnameStatus::Draft => DbOpnameStatus::Draft,
        OpnameStatus::InProgress => DbOpnameStatus::InProgress,
        OpnameStatus::Completed => DbOpnameStatus::Completed,
        OpnameStatus::Canceled => DbOpnameStatus::Canceled,
    }
}

fn db_to_domain_status(status: DbOpnameStatus) -> OpnameStatus {
    match status {
        DbOpnameStatus::Draft => OpnameStatus::Draft,
        DbOpnameStatus::InProgress => OpnameStatus::InProgress,
        DbOpnameStatus::Completed => OpnameStatus::Completed,
        DbOpnameStatus::Canceled => OpnameStatus::Canceled,
    }
}

fn domain_to_db_category(category: OpnameCategory) -> DbOpnameCategory {
    match category {
        OpnameCategory::Regular => DbOpnameCategory::Regular,
        OpnameCategory::Daily => DbOpnameCategory::Daily,
    }
}

fn db_to_domain_category(category: DbOpnameCategory) -> OpnameCategory {
    match category {
        DbOpnameCategory::Regular => OpnameCategory::Regular,
        DbOpnameCategory::Daily => OpnameCategory::Daily,
    }
}

fn domain_to_db_reason(reason: ReasonCode) -> DbAdjustmentReason {
    match reason {
        ReasonCode::CountReconciliation => DbAdjustmentReason::CountReconciliation,
        ReasonCode::Damage => DbAdjustmentReason::Damage,
        ReasonCode::Expiry => DbAdjustmentReason::Expiry,
        ReasonCode::ManualCorrection => DbAdjustmentReason::ManualCorrection,
        ReasonCode::Other => DbAdjustmentReason::Other,
    }
}

fn db_to_domain_reason(reason: DbAdjustmentReason) -> ReasonCode {
    match reason {
        DbAdjustmentReason::CountReconciliation => ReasonCode::CountReconciliation,
        DbAdjustmentReason::Damage => ReasonCode::Damage,
        DbAdjustmentReason::Expiry => ReasonCode::Expiry,
        DbAdjustmentReason::ManualCorrection => ReasonCode::ManualCorrection,
        DbAdjustmentReason::Other => ReasonCode::Other,
    }
}
