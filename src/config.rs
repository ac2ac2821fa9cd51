//! # Configuration
//!
//! Layered configuration for the record set: built-in defaults, an optional
//! TOML file, `RECORDSET__*` environment variables (double underscore
//! separates nested keys, e.g. `RECORDSET__WRITE__WORKER_COUNT=8`) and
//! finally the conventional `DATABASE_URL`.

use crate::error::{RecordSetError, RecordSetResult};
use crate::writer::WriteOptions;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "RECORDSET";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSetConfig {
    pub database: DatabaseConfig,
    pub write: WriteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/recordset_development".to_string(),
            pool: PoolConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: 300,
            max_lifetime_seconds: 1800,
        }
    }
}

/// Defaults for the concurrent batched write path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Records per batch; 0 writes everything as one synchronous batch
    pub batch_size: usize,
    pub worker_count: usize,
    pub timeout_seconds: u64,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            worker_count: 4,
            timeout_seconds: 600,
        }
    }
}

impl WriteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl From<&WriteConfig> for WriteOptions {
    fn from(config: &WriteConfig) -> Self {
        WriteOptions {
            batch_size: config.batch_size,
            worker_count: config.worker_count,
            timeout: config.timeout(),
        }
    }
}

impl RecordSetConfig {
    /// Load defaults, then `path` (if given and present), then the environment
    pub fn load(path: Option<&Path>) -> RecordSetResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let mut config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from the environment only
    pub fn from_env() -> RecordSetResult<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> RecordSetResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(RecordSetError::ConfigurationError(
                "database.url must not be empty".to_string(),
            ));
        }

        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(RecordSetError::ConfigurationError(
                "database.pool.max_connections must be positive".to_string(),
            ));
        }
        if pool.min_connections > pool.max_connections {
            return Err(RecordSetError::ConfigurationError(format!(
                "database.pool.min_connections ({}) exceeds max_connections ({})",
                pool.min_connections, pool.max_connections
            )));
        }

        if self.write.worker_count == 0 {
            return Err(RecordSetError::ConfigurationError(
                "write.worker_count must be positive".to_string(),
            ));
        }
        if self.write.timeout_seconds == 0 {
            return Err(RecordSetError::ConfigurationError(
                "write.timeout_seconds must be positive".to_string(),
            ));
        }

        // Each concurrent batch writer holds its own pooled session
        if (pool.max_connections as usize) < self.write.worker_count {
            return Err(RecordSetError::ConfigurationError(format!(
                "requested {} batch writers but only {} database connections available",
                self.write.worker_count, pool.max_connections
            )));
        }

        Ok(())
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::from(&self.write)
    }
}
