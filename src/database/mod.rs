//! # Data Sources
//!
//! Session-oriented access to a relational data source.
//!
//! ## Key Components
//!
//! - [`source`] - The [`DataSource`] / [`Session`] traits, parameter values and errors
//! - [`postgres`] - SQLx-backed PostgreSQL source with one pooled connection per session
//! - [`memory`] - In-process source for tests, benches and local development
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use recordset::config::DatabaseConfig;
//! use recordset::database::PgDataSource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = PgDataSource::connect(&DatabaseConfig::default()).await?;
//! assert!(source.health_check().await?);
//! source.close().await;
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod postgres;
pub mod source;

pub use memory::{ExecutedBatch, MemoryDataSource, MemoryFailure, MemoryRow, MemorySession};
pub use postgres::{PgDataSource, PgSession};
pub use source::{BoxError, DataSource, DataSourceError, Session, SqlValue, UpdateCount};
