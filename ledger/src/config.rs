//! Configuration management for the stall ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STALL__ prefix

use std::path::PathBuf;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::store::DEFAULT_BASE_KEY;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Current environment (development, production)
    pub environment: String,

    pub storage: StorageConfig,

    pub logging: LoggingConfig,

    pub reporting: ReportingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one file per storage key
    pub data_dir: PathBuf,

    /// Key of the primary slot; every other slot key derives from it
    pub base_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportingConfig {
    /// Window used by `stats`, `by-location`, `by-date` and `pace` when none is given
    pub default_window_days: u32,
}

impl LedgerConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STALL__ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::load_from(&environment, Environment::with_prefix("STALL"))
    }

    fn load_from(environment: &str, env_source: Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment)?
            .set_default("storage.data_dir", "./data")?
            .set_default("storage.base_key", DEFAULT_BASE_KEY)?
            .set_default("logging.filter", "stall_ledger=info")?
            .set_default("logging.json", false)?
            .set_default("reporting.default_window_days", 30)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STALL__ prefix)
            .add_source(env_source.prefix_separator("__").separator("__").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            base_key: DEFAULT_BASE_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("STALL").source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::load_from("test", vars(&[])).unwrap();
        assert_eq!(config.environment, "test");
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
        assert_eq!(config.storage.base_key, "accountRecords");
        assert!(!config.logging.json);
        assert_eq!(config.reporting.default_window_days, 30);
    }

    #[test]
    fn test_environment_overrides() {
        let config = LedgerConfig::load_from(
            "test",
            vars(&[
                ("STALL__STORAGE__DATA_DIR", "/tmp/stall"),
                ("STALL__LOGGING__JSON", "true"),
                ("STALL__REPORTING__DEFAULT_WINDOW_DAYS", "7"),
            ]),
        )
        .unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/stall"));
        assert!(config.logging.json);
        assert_eq!(config.reporting.default_window_days, 7);
    }
}
