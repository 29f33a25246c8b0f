//! Configuration management for metsiiify
//!
//! Layered configuration loaded from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! Environment overrides use the pattern `METSIIIFY__<section>__<key>`,
//! e.g. `METSIIIFY__SERVER__BIND_ADDR=0.0.0.0:9000` or
//! `METSIIIFY__IMPORT__WORKERS=8`.
//!
//! The configuration file defaults to `config/metsiiify.toml` and can be
//! overridden with the `METSIIIFY_CONFIG` environment variable.

mod models;
mod sources;

pub use models::{ArchiveConfig, Config, ImportConfig, ServerConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path, for tests with custom files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.items_per_page == 0 {
            return Err(ConfigError::Invalid(
                "server.items_per_page must be at least 1".into(),
            ));
        }
        if self.import.workers == 0 {
            return Err(ConfigError::Invalid(
                "import.workers must be at least 1".into(),
            ));
        }
        if self.server.base_url.ends_with('/') {
            return Err(ConfigError::Invalid(
                "server.base_url must not end with a slash".into(),
            ));
        }
        Ok(())
    }
}
