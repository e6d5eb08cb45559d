//! Opname Domain Ports
//!
//! The opname service talks to three collaborators, all behind traits:
//!
//! - [`ProductCatalog`]: read-only view of the externally owned products
//! - [`OpnameStore`]: persistence of sessions and the adjustment ledger
//! - [`OpnameTransaction`]: a unit of work opened on the store, which also
//!   acts as the [`StockLedger`] so live quantities change atomically with
//!   the session and the ledger
//!
//! # Transactions
//!
//! Every mutating use case opens a transaction, works through it and calls
//! [`OpnameTransaction::commit`]. Dropping the handle without committing
//! discards everything, so an early `?` return rolls back on its own:
//!
//! ```rust,ignore
//! let mut tx = store.begin().await?;
//! let mut session = tx.lock_session(id).await?;
//! session.cancel()?;
//! tx.update_session(&session).await?;
//! tx.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    DomainPort, HealthCheckable, LineItemId, OpnameId, PortError, ProductId,
};

use crate::adjustment::{AdjustmentQuery, AdjustmentRecord};
use crate::line_item::LineItem;
use crate::session::{OpnameSession, OpnameStatus};

/// Query parameters for listing sessions
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    /// Filter by status
    pub status: Option<OpnameStatus>,
    /// Inclusive lower bound on the count date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the count date
    pub date_to: Option<NaiveDate>,
    /// Restrict to one session
    pub session_id: Option<OpnameId>,
    /// Limit results
    pub limit: Option<u32>,
}

impl SessionQuery {
    /// Creates a query to find by status
    pub fn by_status(status: OpnameStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Restricts the count date range
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    /// True when the session satisfies every filter set on the query
    pub fn matches(&self, session: &OpnameSession) -> bool {
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if session.count_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if session.count_date > to {
                return false;
            }
        }
        if let Some(id) = self.session_id {
            if session.id != id {
                return false;
            }
        }
        true
    }
}

/// Read-only access to the product catalog
#[async_trait]
pub trait ProductCatalog: DomainPort {
    /// True if the product is known to the catalog
    async fn exists(&self, product_id: &ProductId) -> Result<bool, PortError>;

    /// Display name of a product, or `PortError::NotFound`
    async fn name(&self, product_id: &ProductId) -> Result<String, PortError>;
}

/// Live inventory quantities
///
/// Reads and writes happen inside an open transaction; a failure of either
/// must abort the enclosing unit of work.
#[async_trait]
pub trait StockLedger: Send {
    /// Current live quantity, or `PortError::NotFound` for unknown products
    async fn read_quantity(&mut self, product_id: &ProductId) -> Result<i64, PortError>;

    /// Unconditionally overwrites the live quantity
    async fn write_quantity(&mut self, product_id: &ProductId, quantity: i64) -> Result<(), PortError>;
}

/// A unit of work against the opname store
///
/// Nothing becomes visible to other readers until [`commit`](Self::commit)
/// succeeds. Dropping an uncommitted handle rolls back. Calling any method
/// after a commit returns `PortError::Internal`.
#[async_trait]
pub trait OpnameTransaction: StockLedger {
    // ========================================================================
    // Sessions
    // ========================================================================

    /// Inserts a new session header
    async fn insert_session(&mut self, session: &OpnameSession) -> Result<(), PortError>;

    /// Loads a session with its line items and locks it for this transaction
    async fn lock_session(&mut self, id: OpnameId) -> Result<OpnameSession, PortError>;

    /// Writes the session header; line items are written separately
    async fn update_session(&mut self, session: &OpnameSession) -> Result<(), PortError>;

    /// Deletes a session and its line items
    async fn delete_session(&mut self, id: OpnameId) -> Result<(), PortError>;

    // ========================================================================
    // Line items
    // ========================================================================

    /// Finds a line item by id
    async fn find_line_item(&mut self, id: LineItemId) -> Result<LineItem, PortError>;

    /// Inserts a line item; `PortError::Conflict` if the product is already in the session
    async fn insert_line_item(&mut self, item: &LineItem) -> Result<(), PortError>;

    /// Writes the counted figures of a line item
    async fn update_line_item(&mut self, item: &LineItem) -> Result<(), PortError>;

    async fn delete_line_item(&mut self, id: LineItemId) -> Result<(), PortError>;

    // ========================================================================
    // Ledger
    // ========================================================================

    /// Appends an adjustment record
    async fn insert_adjustment(&mut self, record: &AdjustmentRecord) -> Result<(), PortError>;

    /// Makes every change of this transaction durable
    async fn commit(&mut self) -> Result<(), PortError>;
}

/// The persistence port of the opname domain
#[async_trait]
pub trait OpnameStore: DomainPort + HealthCheckable {
    /// Opens a new transaction
    async fn begin(&self) -> Result<Box<dyn OpnameTransaction>, PortError>;

    /// Retrieves a session with its line items
    async fn get_session(&self, id: OpnameId) -> Result<OpnameSession, PortError>;

    /// Finds sessions, newest count date first
    async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<OpnameSession>, PortError>;

    /// Reads the adjustment ledger, newest first
    async fn find_adjustments(&self, query: AdjustmentQuery) -> Result<Vec<AdjustmentRecord>, PortError>;
}

/// In-memory adapters for testing
///
/// `MockOpnameStore` serialises transactions behind a `tokio::sync::Mutex`.
/// A transaction works on a copy of the whole state and swaps it in on
/// commit, so a dropped transaction leaves the store untouched.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

    use core_kernel::HealthCheckResult;

    /// In-memory product catalog
    #[derive(Debug, Default, Clone)]
    pub struct MockProductCatalog {
        products: Arc<RwLock<HashMap<ProductId, String>>>,
    }

    impl MockProductCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with products for testing
        pub async fn with_products<I, P, N>(products: I) -> Self
        where
            I: IntoIterator<Item = (P, N)>,
            P: Into<ProductId>,
            N: Into<String>,
        {
            let catalog = Self::new();
            for (id, name) in products {
                catalog.insert(id, name).await;
            }
            catalog
        }

        pub async fn insert(&self, product_id: impl Into<ProductId>, name: impl Into<String>) {
            self.products.write().await.insert(product_id.into(), name.into());
        }
    }

    impl DomainPort for MockProductCatalog {}

    #[async_trait]
    impl ProductCatalog for MockProductCatalog {
        async fn exists(&self, product_id: &ProductId) -> Result<bool, PortError> {
            Ok(self.products.read().await.contains_key(product_id))
        }

        async fn name(&self, product_id: &ProductId) -> Result<String, PortError> {
            self.products
                .read()
                .await
                .get(product_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Product", product_id))
        }
    }

    /// Failures to inject into the next transactions
    ///
    /// Positions are 1-based and counted per transaction.
    #[derive(Debug, Clone, Default)]
    pub struct FaultPlan {
        /// Fail the Nth `write_quantity` call
        pub fail_stock_write_at: Option<usize>,
        /// Fail the Nth `insert_adjustment` call
        pub fail_adjustment_insert_at: Option<usize>,
        /// Fail `commit`
        pub fail_commit: bool,
    }

    #[derive(Debug, Clone, Default)]
    struct MockState {
        sessions: BTreeMap<OpnameId, OpnameSession>,
        adjustments: Vec<AdjustmentRecord>,
        stock: HashMap<ProductId, i64>,
        stock_writes: usize,
        faults: FaultPlan,
    }

    /// In-memory opname store with transactional semantics
    #[derive(Debug, Default, Clone)]
    pub struct MockOpnameStore {
        state: Arc<Mutex<MockState>>,
    }

    impl MockOpnameStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates live stock
        pub async fn with_stock<I, P>(stock: I) -> Self
        where
            I: IntoIterator<Item = (P, i64)>,
            P: Into<ProductId>,
        {
            let store = Self::new();
            for (product_id, quantity) in stock {
                store.set_stock(product_id, quantity).await;
            }
            store
        }

        /// Sets a live quantity outside of any transaction
        pub async fn set_stock(&self, product_id: impl Into<ProductId>, quantity: i64) {
            self.state.lock().await.stock.insert(product_id.into(), quantity);
        }

        /// Current live quantity of a product
        pub async fn stock_of(&self, product_id: impl Into<ProductId>) -> Option<i64> {
            self.state.lock().await.stock.get(&product_id.into()).copied()
        }

        /// Every committed adjustment, in insertion order
        pub async fn adjustments(&self) -> Vec<AdjustmentRecord> {
            self.state.lock().await.adjustments.clone()
        }

        /// Number of committed stock writes
        pub async fn stock_writes(&self) -> usize {
            self.state.lock().await.stock_writes
        }

        /// Injects failures into subsequent transactions
        pub async fn inject_faults(&self, faults: FaultPlan) {
            self.state.lock().await.faults = faults;
        }

        pub async fn clear_faults(&self) {
            self.state.lock().await.faults = FaultPlan::default();
        }
    }

    impl DomainPort for MockOpnameStore {}

    #[async_trait]
    impl HealthCheckable for MockOpnameStore {
        async fn health_check(&self) -> HealthCheckResult {
            let mut result = HealthCheckResult::healthy("mock-opname-store");
            result.message = Some("Mock adapter always healthy".to_string());
            result
        }
    }

    #[async_trait]
    impl OpnameStore for MockOpnameStore {
        async fn begin(&self) -> Result<Box<dyn OpnameTransaction>, PortError> {
            let guard = self.state.clone().lock_owned().await;
            let staged = guard.clone();
            Ok(Box::new(MockOpnameTransaction {
                guard: Some(guard),
                staged,
                stock_write_calls: 0,
                adjustment_insert_calls: 0,
            }))
        }

        async fn get_session(&self, id: OpnameId) -> Result<OpnameSession, PortError> {
            self.state
                .lock()
                .await
                .sessions
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("OpnameSession", id))
        }

        async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<OpnameSession>, PortError> {
            let state = self.state.lock().await;
            let mut results: Vec<_> = state
                .sessions
                .values()
                .filter(|s| query.matches(s))
                .cloned()
                .collect();
            results.sort_by(|a, b| {
                b.count_date
                    .cmp(&a.count_date)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            if let Some(limit) = query.limit {
                results.truncate(limit as usize);
            }
            Ok(results)
        }

        async fn find_adjustments(&self, query: AdjustmentQuery) -> Result<Vec<AdjustmentRecord>, PortError> {
            let state = self.state.lock().await;
            let mut results: Vec<_> = state
                .adjustments
                .iter()
                .rev()
                .filter(|r| query.matches(r))
                .cloned()
                .collect();
            results.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
            if let Some(limit) = query.limit {
                results.truncate(limit as usize);
            }
            Ok(results)
        }
    }

    /// Transaction over a staged copy of the mock state
    pub struct MockOpnameTransaction {
        guard: Option<OwnedMutexGuard<MockState>>,
        staged: MockState,
        stock_write_calls: usize,
        adjustment_insert_calls: usize,
    }

    impl MockOpnameTransaction {
        fn state(&mut self) -> Result<&mut MockState, PortError> {
            if self.guard.is_none() {
                return Err(PortError::internal("transaction already committed"));
            }
            Ok(&mut self.staged)
        }

        fn session_mut(&mut self, id: OpnameId) -> Result<&mut OpnameSession, PortError> {
            self.state()?
                .sessions
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("OpnameSession", id))
        }
    }

    #[async_trait]
    impl StockLedger for MockOpnameTransaction {
        async fn read_quantity(&mut self, product_id: &ProductId) -> Result<i64, PortError> {
            self.state()?
                .stock
                .get(product_id)
                .copied()
                .ok_or_else(|| PortError::not_found("Product", product_id))
        }

        async fn write_quantity(&mut self, product_id: &ProductId, quantity: i64) -> Result<(), PortError> {
            self.stock_write_calls += 1;
            let call = self.stock_write_calls;
            let state = self.state()?;
            if state.faults.fail_stock_write_at == Some(call) {
                return Err(PortError::internal(format!("injected stock write failure for {product_id}")));
            }
            let slot = state
                .stock
                .get_mut(product_id)
                .ok_or_else(|| PortError::not_found("Product", product_id))?;
            *slot = quantity;
            state.stock_writes += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl OpnameTransaction for MockOpnameTransaction {
        async fn insert_session(&mut self, session: &OpnameSession) -> Result<(), PortError> {
            let state = self.state()?;
            if state.sessions.contains_key(&session.id) {
                return Err(PortError::conflict(format!("stock opname {} already exists", session.id)));
            }
            let mut header = session.clone();
            header.line_items.clear();
            state.sessions.insert(session.id, header);
            Ok(())
        }

        async fn lock_session(&mut self, id: OpnameId) -> Result<OpnameSession, PortError> {
            Ok(self.session_mut(id)?.clone())
        }

        async fn update_session(&mut self, session: &OpnameSession) -> Result<(), PortError> {
            let stored = self.session_mut(session.id)?;
            let items = std::mem::take(&mut stored.line_items);
            *stored = session.clone();
            stored.line_items = items;
            Ok(())
        }

        async fn delete_session(&mut self, id: OpnameId) -> Result<(), PortError> {
            self.state()?
                .sessions
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("OpnameSession", id))
        }

        async fn find_line_item(&mut self, id: LineItemId) -> Result<LineItem, PortError> {
            self.state()?
                .sessions
                .values()
                .flat_map(|s| s.line_items.iter())
                .find(|item| item.id == id)
                .cloned()
                .ok_or_else(|| PortError::not_found("LineItem", id))
        }

        async fn insert_line_item(&mut self, item: &LineItem) -> Result<(), PortError> {
            let session = self.session_mut(item.session_id)?;
            if session.contains_product(&item.product_id) {
                return Err(PortError::conflict(format!(
                    "product {} is already part of stock opname {}",
                    item.product_id, item.session_id
                )));
            }
            session.line_items.push(item.clone());
            Ok(())
        }

        async fn update_line_item(&mut self, item: &LineItem) -> Result<(), PortError> {
            let session = self.session_mut(item.session_id)?;
            let stored = session
                .line_items
                .iter_mut()
                .find(|stored| stored.id == item.id)
                .ok_or_else(|| PortError::not_found("LineItem", item.id))?;
            *stored = item.clone();
            Ok(())
        }

        async fn delete_line_item(&mut self, id: LineItemId) -> Result<(), PortError> {
            for session in self.state()?.sessions.values_mut() {
                if let Some(position) = session.line_items.iter().position(|item| item.id == id) {
                    session.line_items.remove(position);
                    return Ok(());
                }
            }
            Err(PortError::not_found("LineItem", id))
        }

        async fn insert_adjustment(&mut self, record: &AdjustmentRecord) -> Result<(), PortError> {
            self.adjustment_insert_calls += 1;
            let call = self.adjustment_insert_calls;
            let state = self.state()?;
            if state.faults.fail_adjustment_insert_at == Some(call) {
                return Err(PortError::internal(format!(
                    "injected adjustment insert failure for {}",
                    record.product_id
                )));
            }
            state.adjustments.push(record.clone());
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), PortError> {
            let mut guard = self
                .guard
                .take()
                .ok_or_else(|| PortError::internal("transaction already committed"))?;
            if self.staged.faults.fail_commit {
                return Err(PortError::connection("injected commit failure"));
            }
            *guard = std::mem::take(&mut self.staged);
            Ok(())
        }
    }

}
