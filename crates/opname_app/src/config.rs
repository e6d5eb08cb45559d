//! Application configuration
//!
//! Settings are read, lowest precedence first, from built-in defaults, an
//! optional configuration file and `OPNAME_`-prefixed environment variables.
//! Nested keys use a double underscore:
//!
//! ```text
//! OPNAME_DATABASE__URL=postgres://opname@db/opname
//! OPNAME_DATABASE__MAX_CONNECTIONS=20
//! OPNAME_LOGGING__JSON=true
//! OPNAME_OPNAME__STOCK_WRITE_POLICY=apply_delta
//! ```

use std::path::Path;

use serde::Deserialize;

use core_kernel::CoreError;
use domain_opname::{ServiceOptions, SeverityBand, SeverityBands};
use infra_db::DatabaseConfig;

/// Prefix of the environment variables read by [`AppConfig::load`]
pub const ENV_PREFIX: &str = "OPNAME";

/// Base name of the optional configuration file in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "opname";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    /// Service tunables
    pub opname: ServiceOptions,
    /// Bands used to classify discrepancies; the built-in bands when unset
    pub severity_bands: Option<Vec<SeverityBand>>,
}

impl AppConfig {
    /// Loads configuration from an optional file and the environment
    ///
    /// With `path` set the file must exist; otherwise `opname.{toml,yaml,json,...}`
    /// in the working directory is used when present.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if a source cannot be read or
    /// parsed, or if the result fails [`AppConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let builder = config::Config::builder().add_source(file).add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::build(builder)
    }

    /// Parses configuration from a TOML document, without the environment
    pub fn from_toml(document: &str) -> Result<Self, CoreError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self, CoreError> {
        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialization alone cannot
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.database.url.trim().is_empty() {
            return Err(CoreError::configuration("database.url must not be empty"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(CoreError::configuration(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        self.severity_bands().map(|_| ())
    }

    /// The validated severity bands
    pub fn severity_bands(&self) -> Result<SeverityBands, CoreError> {
        match &self.severity_bands {
            Some(bands) => SeverityBands::new(bands.clone())
                .map_err(|e| CoreError::configuration(format!("severity_bands: {e}"))),
            None => Ok(SeverityBands::default()),
        }
    }
}
