//! Stock Opname Application Layer
//!
//! Loads configuration, sets up logging and wires the PostgreSQL adapters
//! into an [`OpnameService`].
//!
//! # Example
//!
//! ```rust,ignore
//! use opname_app::{bootstrap, config::AppConfig, telemetry};
//!
//! dotenvy::dotenv().ok();
//! let config = AppConfig::load(None)?;
//! telemetry::init_tracing(&config.logging)?;
//! let app = bootstrap(config).await?;
//! let sessions = app.service.list_sessions(Default::default()).await?;
//! ```

pub mod config;
pub mod telemetry;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use core_kernel::CoreError;
use domain_opname::{OpnameService, SeverityBands};
use infra_db::{create_pool, DatabaseError, DatabasePool, PostgresOpnameStore};

use crate::config::AppConfig;

/// Errors raised while starting the application
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A wired application
pub struct OpnameApp {
    pub config: AppConfig,
    pub pool: DatabasePool,
    pub store: Arc<PostgresOpnameStore>,
    pub service: OpnameService,
    /// Bands for discrepancy reports
    pub severity_bands: SeverityBands,
}

/// Connects to the database and builds the service
///
/// Migrations are not applied here; see [`infra_db::run_migrations`].
pub async fn bootstrap(config: AppConfig) -> Result<OpnameApp, BootstrapError> {
    config.validate()?;
    let severity_bands = config.severity_bands()?;
    let pool = create_pool(&config.database).await?;

    let store = Arc::new(PostgresOpnameStore::new(pool.clone()));
    let service = OpnameService::new(store.clone(), store.clone()).with_options(config.opname.clone());

    info!(
        stock_write_policy = ?config.opname.stock_write_policy,
        severity_bands = severity_bands.bands().len(),
        "Stock opname service ready"
    );
    Ok(OpnameApp {
        config,
        pool,
        store,
        service,
        severity_bands,
    })
}
