//! Stock opname repository implementation
//!
//! Database access for count sessions, their line items, the stock
//! adjustment ledger and the live quantities in `products`.
//!
//! Reads that stand on their own go through [`OpnameRepository`] and the
//! pool. Everything that must be atomic is exposed as an associated function
//! taking a `&mut PgConnection`, so callers can run it on an open
//! transaction.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Repository for stock opname data
#[derive(Debug, Clone)]
pub struct OpnameRepository {
    pool: PgPool,
}

impl OpnameRepository {
    /// Creates a new OpnameRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Pool reads
    // ========================================================================

    /// Retrieves a session header by id
    pub async fn get_session(&self, session_id: Uuid) -> Result<SessionRow, DatabaseError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM opname_sessions WHERE session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("OpnameSession", session_id))?;

        Ok(row)
    }

    /// Finds session headers, newest count date first
    pub async fn find_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM opname_sessions
            WHERE ($1::opname_status IS NULL OR status = $1)
              AND ($2::date IS NULL OR count_date >= $2)
              AND ($3::date IS NULL OR count_date <= $3)
              AND ($4::uuid IS NULL OR session_id = $4)
            ORDER BY count_date DESC, created_at DESC
            LIMIT $5
            "#
        ))
        .bind(filter.status)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.session_id)
        .bind(filter.limit.unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Line items of several sessions in creation order
    pub async fn line_items_for(&self, session_ids: &[Uuid]) -> Result<Vec<LineItemRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LineItemRow>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM opname_line_items
            WHERE session_id = ANY($1)
            ORDER BY created_at, line_item_id
            "#
        ))
        .bind(session_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Reads the adjustment ledger, newest first
    pub async fn find_adjustments(&self, filter: &AdjustmentFilter) -> Result<Vec<AdjustmentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            SELECT
                adjustment_id, product_id, previous_quantity, new_quantity, delta,
                reason_code, reference_id, note, occurred_at, performed_by
            FROM stock_adjustments
            WHERE ($1::text IS NULL OR product_id = $1)
              AND ($2::adjustment_reason IS NULL OR reason_code = $2)
              AND ($3::text IS NULL OR reference_id = $3)
              AND ($4::timestamptz IS NULL OR occurred_at >= $4)
              AND ($5::timestamptz IS NULL OR occurred_at <= $5)
            ORDER BY occurred_at DESC, adjustment_id DESC
            LIMIT $6
            "#,
        )
        .bind(filter.product_id.as_deref())
        .bind(filter.reason_code)
        .bind(filter.reference_id.as_deref())
        .bind(filter.occurred_from)
        .bind(filter.occurred_to)
        .bind(filter.limit.unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Looks up a product in the catalog table
    pub async fn find_product(&self, product_id: &str) -> Result<Option<ProductRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT product_id, name, quantity FROM products WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ========================================================================
    // Transactional statements
    // ========================================================================

    /// Loads a session header and locks the row until the transaction ends
    pub async fn lock_session(conn: &mut PgConnection, session_id: Uuid) -> Result<SessionRow, DatabaseError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM opname_sessions WHERE session_id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("OpnameSession", session_id))?;

        Ok(row)
    }

    /// Line items of one session in creation order
    pub async fn session_line_items(conn: &mut PgConnection, session_id: Uuid) -> Result<Vec<LineItemRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LineItemRow>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM opname_line_items
            WHERE session_id = $1
            ORDER BY created_at, line_item_id
            "#
        ))
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    pub async fn insert_session(conn: &mut PgConnection, row: &SessionRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO opname_sessions (
                session_id, count_date, started_at, completed_at, status, category,
                is_active, notes, created_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.session_id)
        .bind(row.count_date)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.status)
        .bind(row.category)
        .bind(row.is_active)
        .bind(&row.notes)
        .bind(&row.created_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes every mutable header column
    pub async fn update_session(conn: &mut PgConnection, row: &SessionRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE opname_sessions
            SET count_date = $2,
                started_at = $3,
                completed_at = $4,
                status = $5,
                is_active = $6,
                notes = $7,
                updated_at = $8
            WHERE session_id = $1
            "#,
        )
        .bind(row.session_id)
        .bind(row.count_date)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.status)
        .bind(row.is_active)
        .bind(&row.notes)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("OpnameSession", row.session_id));
        }
        Ok(())
    }

    /// Deletes a session; line items go with it through the cascade
    pub async fn delete_session(conn: &mut PgConnection, session_id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM opname_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("OpnameSession", session_id));
        }
        Ok(())
    }

    pub async fn find_line_item(conn: &mut PgConnection, line_item_id: Uuid) -> Result<LineItemRow, DatabaseError> {
        let row = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM opname_line_items WHERE line_item_id = $1"
        ))
        .bind(line_item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("LineItem", line_item_id))?;

        Ok(row)
    }

    /// Inserts a line item
    ///
    /// A second row for the same `(session_id, product_id)` violates
    /// `uq_opname_line_items_product` and comes back as `DuplicateEntry`.
    pub async fn insert_line_item(conn: &mut PgConnection, row: &LineItemRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO opname_line_items (
                line_item_id, session_id, product_id, system_quantity, actual_quantity,
                variance, variance_percent, note, recorded_by, recorded_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.line_item_id)
        .bind(row.session_id)
        .bind(&row.product_id)
        .bind(row.system_quantity)
        .bind(row.actual_quantity)
        .bind(row.variance)
        .bind(row.variance_percent)
        .bind(&row.note)
        .bind(&row.recorded_by)
        .bind(row.recorded_at)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DatabaseError::from(e).classify() {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("LineItem", "product_id", &row.product_id)
            }
            other => other,
        })?;

        Ok(())
    }

    /// Writes the counted figures of a line item
    pub async fn update_line_item(conn: &mut PgConnection, row: &LineItemRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE opname_line_items
            SET actual_quantity = $2,
                variance = $3,
                variance_percent = $4,
                note = $5,
                recorded_by = $6,
                recorded_at = $7
            WHERE line_item_id = $1
            "#,
        )
        .bind(row.line_item_id)
        .bind(row.actual_quantity)
        .bind(row.variance)
        .bind(row.variance_percent)
        .bind(&row.note)
        .bind(&row.recorded_by)
        .bind(row.recorded_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("LineItem", row.line_item_id));
        }
        Ok(())
    }

    pub async fn delete_line_item(conn: &mut PgConnection, line_item_id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM opname_line_items WHERE line_item_id = $1")
            .bind(line_item_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("LineItem", line_item_id));
        }
        Ok(())
    }

    /// Appends a ledger row
    pub async fn insert_adjustment(conn: &mut PgConnection, row: &AdjustmentRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                adjustment_id, product_id, previous_quantity, new_quantity, delta,
                reason_code, reference_id, note, occurred_at, performed_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(row.adjustment_id)
        .bind(&row.product_id)
        .bind(row.previous_quantity)
        .bind(row.new_quantity)
        .bind(row.delta)
        .bind(row.reason_code)
        .bind(&row.reference_id)
        .bind(&row.note)
        .bind(row.occurred_at)
        .bind(&row.performed_by)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Reads a live quantity and locks the product row
    pub async fn read_quantity(conn: &mut PgConnection, product_id: &str) -> Result<i64, DatabaseError> {
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM products WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Product", product_id))?;

        Ok(quantity)
    }

    /// Overwrites a live quantity
    pub async fn write_quantity(conn: &mut PgConnection, product_id: &str, quantity: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE products SET quantity = $2, updated_at = NOW() WHERE product_id = $1",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Product", product_id));
        }
        Ok(())
    }
}

const SESSION_COLUMNS: &str = "session_id, count_date, started_at, completed_at, status, category, \
     is_active, notes, created_by, created_at, updated_at";

const LINE_ITEM_COLUMNS: &str = "line_item_id, session_id, product_id, system_quantity, actual_quantity, \
     variance, variance_percent, note, recorded_by, recorded_at, created_at";

// ============================================================================
// Database types
// ============================================================================

/// Session status enum matching the database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "opname_status", rename_all = "snake_case")]
pub enum OpnameStatus {
    Draft,
    InProgress,
    Completed,
    Canceled,
}

/// Session category enum matching the database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "opname_category", rename_all = "snake_case")]
pub enum OpnameCategory {
    Regular,
    Daily,
}

/// Adjustment reason enum matching the database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "adjustment_reason", rename_all = "snake_case")]
pub enum AdjustmentReason {
    CountReconciliation,
    Damage,
    Expiry,
    ManualCorrection,
    Other,
}

/// Session header row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub count_date: NaiveDate,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: OpnameStatus,
    pub category: OpnameCategory,
    pub is_active: bool,
    pub notes: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRow {
    pub line_item_id: Uuid,
    pub session_id: Uuid,
    pub product_id: String,
    pub system_quantity: i64,
    pub actual_quantity: i64,
    pub variance: i64,
    pub variance_percent: f64,
    pub note: String,
    pub recorded_by: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdjustmentRow {
    pub adjustment_id: Uuid,
    pub product_id: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub delta: i64,
    pub reason_code: AdjustmentReason,
    pub reference_id: Option<String>,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
    pub performed_by: String,
}

/// Catalog row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
}

/// Filter for session listings
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<OpnameStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub session_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Filter for ledger reads
#[derive(Debug, Clone, Default)]
pub struct AdjustmentFilter {
    pub product_id: Option<String>,
    pub reason_code: Option<AdjustmentReason>,
    pub reference_id: Option<String>,
    pub occurred_from: Option<DateTime<Utc>>,
    pub occurred_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}
