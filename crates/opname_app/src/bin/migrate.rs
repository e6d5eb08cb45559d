//! Stock Opname - Migration Binary
//!
//! Applies the database schema and checks that the store is reachable.
//!
//! # Usage
//!
//! ```bash
//! # Use opname.toml from the working directory if present
//! cargo run --bin opname-migrate
//!
//! # Explicit configuration file
//! cargo run --bin opname-migrate -- config/production.toml
//!
//! # Environment only
//! OPNAME_DATABASE__URL=postgres://... cargo run --bin opname-migrate
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use core_kernel::{AdapterHealth, HealthCheckable};
use infra_db::run_migrations;
use opname_app::{bootstrap, config::AppConfig, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(path.as_deref()).context("loading configuration")?;
    telemetry::init_tracing(&config.logging).context("initialising tracing")?;

    let app = bootstrap(config).await.context("connecting to the database")?;
    run_migrations(&app.pool).await.context("applying migrations")?;

    let health = app.store.health_check().await;
    if health.status != AdapterHealth::Healthy {
        bail!(
            "store unhealthy after migration: {}",
            health.message.unwrap_or_default()
        );
    }

    tracing::info!(latency_ms = health.latency_ms, "Database ready");
    Ok(())
}
