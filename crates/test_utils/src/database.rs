//! Database Test Utilities
//!
//! Provides helpers for database testing including testcontainer management
//! and connection pooling for integration tests.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;

/// Default PostgreSQL image for testing
const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "opname_test";

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container with the opname schema applied
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or a migration fails
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            host,
            port,
            ..TestDatabaseConfig::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        infra_db::run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data from the database while preserving the schema
    ///
    /// Useful for resetting state between tests
    pub async fn clear_data(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "TRUNCATE TABLE stock_adjustments, opname_line_items, opname_sessions, products CASCADE",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts or replaces a product with its live quantity
    pub async fn seed_product(
        &self,
        product_id: &str,
        name: &str,
        quantity: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO products (product_id, name, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) DO UPDATE SET name = EXCLUDED.name, quantity = EXCLUDED.quantity
            "#,
        )
        .bind(product_id)
        .bind(name)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Live quantity of a product
    pub async fn quantity_of(&self, product_id: &str) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let quantity = sqlx::query_scalar::<_, i64>("SELECT quantity FROM products WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(quantity)
    }
}

/// Global test database for shared integration tests
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a shared test database instance
///
/// This function provides a singleton test database that can be shared
/// across multiple tests to reduce container startup overhead.
///
/// # Panics
///
/// Panics if the database fails to initialize
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates an isolated test database for a single test
pub async fn create_isolated_test_database() -> Result<TestDatabase, Box<dyn std::error::Error + Send + Sync>> {
    TestDatabase::new().await
}
