//! Tracing subscriber setup

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, else the configured level,
/// else `info`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let (json, plain) = if config.json {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(json)
        .with(plain)
        .try_init()
}
