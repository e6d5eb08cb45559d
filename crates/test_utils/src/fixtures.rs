//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for sessions and products. Fixed values are
//! predictable; the `random_*` helpers draw from `fake` for tests that only
//! need something plausible.

use chrono::NaiveDate;
use fake::faker::lorem::en::Word;
use fake::Fake;

use core_kernel::ProductId;
use domain_opname::{OpnameCategory, OpnameSession};

/// Fixture for session test data
pub struct OpnameFixtures;

impl OpnameFixtures {
    /// Standard count date (end of Q1 2024)
    pub fn count_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    /// A later count date for ordering tests
    pub fn next_count_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    /// Standard operator
    pub fn auditor() -> &'static str {
        "auditor"
    }

    /// Standard counter
    pub fn counter() -> &'static str {
        "counter"
    }

    /// Empty draft in the regular category
    pub fn draft_session() -> OpnameSession {
        OpnameSession::create(
            Self::count_date(),
            "quarter end count",
            Self::auditor(),
            OpnameCategory::Regular,
        )
        .unwrap()
    }

    /// Draft holding one line item per `(product, system quantity)` pair
    pub fn draft_with_items(items: &[(&str, i64)]) -> OpnameSession {
        let mut session = Self::draft_session();
        for (product, quantity) in items {
            session.add_line_item(ProductId::new(*product), *quantity).unwrap();
        }
        session
    }

    /// In-progress session holding the given line items
    pub fn started_with_items(items: &[(&str, i64)]) -> OpnameSession {
        let mut session = Self::draft_with_items(items);
        session.start().unwrap();
        session
    }
}

/// Fixture for product test data
pub struct ProductFixtures;

impl ProductFixtures {
    /// Deterministic product id for index `n`
    pub fn product_id(n: usize) -> ProductId {
        ProductId::new(format!("SKU-{:04}", n))
    }

    /// Plausible product name
    pub fn random_name() -> String {
        let word: String = Word().fake();
        format!("{} {}", word, (1u32..500).fake::<u32>())
    }

    /// `(id, name, quantity)` triples for `count` products sharing a quantity
    pub fn catalog(count: usize, quantity: i64) -> Vec<(ProductId, String, i64)> {
        (1..=count)
            .map(|n| (Self::product_id(n), Self::random_name(), quantity))
            .collect()
    }
}
