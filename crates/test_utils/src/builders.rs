//! Test Data Builders
//!
//! Builders for wiring an [`OpnameService`] onto the in-memory adapters and
//! for constructing requests with sensible defaults. Tests specify only the
//! relevant fields.

use std::sync::Arc;

use chrono::NaiveDate;

use core_kernel::ProductId;
use domain_opname::{
    LineItem, ManualAdjustment, MockOpnameStore, MockProductCatalog, OpnameError, OpnameService,
    OpnameSession, ReasonCode, ServiceOptions, StockWritePolicy,
};

use crate::fixtures::{OpnameFixtures, ProductFixtures};

/// Builder for an in-memory opname setup
pub struct OpnameWorldBuilder {
    products: Vec<(ProductId, String, i64)>,
    options: ServiceOptions,
}

impl Default for OpnameWorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpnameWorldBuilder {
    /// Creates a builder with no products and default options
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
            options: ServiceOptions::default(),
        }
    }

    /// Adds a catalog product with its live quantity
    pub fn with_product(mut self, id: impl Into<ProductId>, name: impl Into<String>, quantity: i64) -> Self {
        self.products.push((id.into(), name.into(), quantity));
        self
    }

    /// Adds `count` generated products sharing one live quantity
    pub fn with_generated_products(mut self, count: usize, quantity: i64) -> Self {
        self.products.extend(ProductFixtures::catalog(count, quantity));
        self
    }

    /// Sets how completion writes live stock
    pub fn with_policy(mut self, policy: StockWritePolicy) -> Self {
        self.options.stock_write_policy = policy;
        self
    }

    /// Sets all service options
    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the adapters and the service
    pub async fn build(self) -> OpnameWorld {
        let store = Arc::new(MockOpnameStore::new());
        let catalog = Arc::new(MockProductCatalog::new());
        for (id, name, quantity) in self.products {
            store.set_stock(id.clone(), quantity).await;
            catalog.insert(id, name).await;
        }

        let service = OpnameService::new(store.clone(), catalog.clone()).with_options(self.options);
        OpnameWorld {
            service,
            store,
            catalog,
        }
    }
}

/// An `OpnameService` together with handles on its in-memory adapters
pub struct OpnameWorld {
    pub service: OpnameService,
    pub store: Arc<MockOpnameStore>,
    pub catalog: Arc<MockProductCatalog>,
}

impl OpnameWorld {
    /// Creates a draft and adds the given products
    pub async fn draft_with(&self, products: &[&str]) -> Result<OpnameSession, OpnameError> {
        let draft = self
            .service
            .create_draft(OpnameFixtures::count_date(), "", OpnameFixtures::auditor())
            .await?;
        for product in products {
            self.service.add_line_item(draft.id, ProductId::new(*product)).await?;
        }
        self.service.get_session(draft.id).await
    }

    /// Creates a draft with the given products and starts it
    pub async fn started_with(&self, products: &[&str]) -> Result<OpnameSession, OpnameError> {
        let draft = self.draft_with(products).await?;
        self.service.start(draft.id, OpnameFixtures::auditor()).await
    }

    /// Records `(product, actual)` counts against a started session
    pub async fn record_counts(
        &self,
        session: &OpnameSession,
        counts: &[(&str, i64)],
    ) -> Result<Vec<LineItem>, OpnameError> {
        let mut recorded = Vec::with_capacity(counts.len());
        for (product, actual) in counts {
            let item = session
                .line_items
                .iter()
                .find(|item| item.product_id.as_str() == *product)
                .ok_or_else(|| OpnameError::not_found("LineItem", product))?;
            recorded.push(
                self.service
                    .record_count(item.id, *actual, OpnameFixtures::counter(), "")
                    .await?,
            );
        }
        Ok(recorded)
    }

    /// Live quantity of a product, 0 if unknown
    pub async fn stock_of(&self, product: &str) -> i64 {
        self.store.stock_of(product).await.unwrap_or(0)
    }
}

/// Builder for manual stock adjustments
pub struct ManualAdjustmentBuilder {
    product_id: ProductId,
    new_quantity: i64,
    reason_code: ReasonCode,
    note: String,
    performed_by: String,
}

impl ManualAdjustmentBuilder {
    /// Creates a builder for a damage write-down to `new_quantity`
    pub fn new(product_id: impl Into<ProductId>, new_quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            new_quantity,
            reason_code: ReasonCode::Damage,
            note: String::new(),
            performed_by: OpnameFixtures::auditor().to_string(),
        }
    }

    pub fn with_reason(mut self, reason_code: ReasonCode) -> Self {
        self.reason_code = reason_code;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn performed_by(mut self, user: impl Into<String>) -> Self {
        self.performed_by = user.into();
        self
    }

    pub fn build(self) -> ManualAdjustment {
        ManualAdjustment {
            product_id: self.product_id,
            new_quantity: self.new_quantity,
            reason_code: self.reason_code,
            note: self.note,
            performed_by: self.performed_by,
        }
    }
}

/// Count date `days` after the standard fixture date
pub fn count_date_plus(days: u64) -> NaiveDate {
    OpnameFixtures::count_date() + chrono::Days::new(days)
}
