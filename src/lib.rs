#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Record Set
//!
//! Typed record access over a relational data source.
//!
//! ## Overview
//!
//! Reads execute a query once and decode its rows into caller-defined record
//! types, collected as a list, a unique key map or a key-grouped multimap.
//! Writes bind records to a parameterized statement through a caller-supplied
//! encoder and execute them in fixed-size batches spread over a bounded set
//! of concurrent workers, each holding its own session.
//!
//! ## Module Organization
//!
//! - [`database`] - Data source seam, PostgreSQL and in-memory sources
//! - [`reader`] - Query execution and row decoding
//! - [`writer`] - Batching, batch units, scheduling and result aggregation
//! - [`record_set`] - Facade over one data source
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Optional `tracing` subscriber setup
//!
//! ## Failure Semantics
//!
//! Batches are not transactionally linked. A batched write either returns
//! the total rows affected or fails with
//! [`RecordSetError::BatchWriteFailure`] naming how many batches failed; in
//! the failure case the batches that succeeded remain written, and the
//! error carries their row total.
//!
//! ## Testing
//!
//! ```bash
//! cargo test                     # Unit and in-memory integration tests
//! cargo test --features test-db  # Adds the PostgreSQL suite (needs DATABASE_URL)
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod reader;
pub mod record_set;
pub mod test_utils;
pub mod validation;
pub mod writer;

pub use config::{DatabaseConfig, PoolConfig, RecordSetConfig, WriteConfig};
pub use database::{
    DataSource, DataSourceError, MemoryDataSource, PgDataSource, Session, SqlValue, UpdateCount,
};
pub use error::{RecordSetError, RecordSetResult};
pub use reader::RecordReader;
pub use record_set::RecordSet;
pub use writer::{
    AggregateWriteResult, BatchWriteUnit, ResultAggregator, WriteOptions, WriteOutcome,
    WriteScheduler,
};
