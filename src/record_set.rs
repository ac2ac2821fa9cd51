//! # Record Set
//!
//! Entry point tying the reader and the batched writer to one data source.
//!
//! ```rust
//! use recordset::database::{MemoryDataSource, SqlValue};
//! use recordset::writer::WriteOptions;
//! use recordset::RecordSet;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let records: Vec<i64> = (0..1000).collect();
//! let record_set = RecordSet::new(MemoryDataSource::new());
//!
//! let rows = record_set
//!     .write_all(
//!         &records,
//!         "INSERT INTO readings (id) VALUES ($1)",
//!         |id: &i64| vec![SqlValue::BigInt(*id)],
//!         &WriteOptions::new(100, 4, Duration::from_secs(60)),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(rows, 1000);
//! # });
//! ```

use crate::config::RecordSetConfig;
use crate::database::{BoxError, DataSource, PgDataSource, SqlValue};
use crate::error::RecordSetResult;
use crate::reader::RecordReader;
use crate::writer::{AggregateWriteResult, WriteOptions, WriteScheduler};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::warn;

pub struct RecordSet<D: DataSource> {
    source: Arc<D>,
    reader: RecordReader<D>,
    scheduler: WriteScheduler<D>,
}

impl<D: DataSource> Clone for RecordSet<D> {
    fn clone(&self) -> Self {
        Self::from_shared(Arc::clone(&self.source))
    }
}

impl<D: DataSource> std::fmt::Debug for RecordSet<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSet")
            .field("max_sessions", &self.source.max_sessions())
            .finish()
    }
}

impl RecordSet<PgDataSource> {
    /// Connect to PostgreSQL using `config.database`
    pub async fn connect(config: &RecordSetConfig) -> RecordSetResult<Self> {
        let source = PgDataSource::connect(&config.database).await?;

        if (config.database.pool.max_connections as usize) < config.write.worker_count {
            warn!(
                max_connections = config.database.pool.max_connections,
                worker_count = config.write.worker_count,
                "Connection pool is smaller than the configured batch writer count"
            );
        }

        Ok(Self::new(source))
    }
}

impl<D: DataSource> RecordSet<D> {
    pub fn new(source: D) -> Self {
        Self::from_shared(Arc::new(source))
    }

    pub fn from_shared(source: Arc<D>) -> Self {
        Self {
            reader: RecordReader::new(Arc::clone(&source)),
            scheduler: WriteScheduler::new(Arc::clone(&source)),
            source,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn reader(&self) -> &RecordReader<D> {
        &self.reader
    }

    pub fn scheduler(&self) -> &WriteScheduler<D> {
        &self.scheduler
    }

    pub async fn read_all<T, F, E>(&self, query: &str, decode: F) -> RecordSetResult<Vec<T>>
    where
        F: Fn(&D::Row) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.reader.read_all(query, decode).await
    }

    pub async fn read_all_as_map<K, T, F, E, G>(
        &self,
        query: &str,
        decode: F,
        key_of: G,
    ) -> RecordSetResult<HashMap<K, T>>
    where
        K: Eq + Hash + Debug,
        F: Fn(&D::Row) -> Result<T, E>,
        E: Into<BoxError>,
        G: Fn(&T) -> K,
    {
        self.reader.read_all_as_map(query, decode, key_of).await
    }

    pub async fn read_all_as_multimap<K, T, F, E, G>(
        &self,
        query: &str,
        decode: F,
        key_of: G,
    ) -> RecordSetResult<HashMap<K, Vec<T>>>
    where
        K: Eq + Hash,
        F: Fn(&D::Row) -> Result<T, E>,
        E: Into<BoxError>,
        G: Fn(&T) -> K,
    {
        self.reader.read_all_as_multimap(query, decode, key_of).await
    }

    /// Write all records as one batch; failures propagate directly
    pub async fn write_records<T, E>(
        &self,
        records: &[T],
        statement: &str,
        encode: E,
    ) -> RecordSetResult<u64>
    where
        E: Fn(&T) -> Vec<SqlValue>,
    {
        self.scheduler.write_single(records, statement, encode).await
    }

    /// Write records in concurrent batches; all-or-nothing from the caller's view
    pub async fn write_all<T, E>(
        &self,
        records: &[T],
        statement: &str,
        encode: E,
        options: &WriteOptions,
    ) -> RecordSetResult<u64>
    where
        E: Fn(&T) -> Vec<SqlValue>,
    {
        self.scheduler
            .write_all(records, statement, encode, options)
            .await
    }

    /// Write records in concurrent batches and return the raw aggregate
    pub async fn schedule<T, E>(
        &self,
        records: &[T],
        statement: &str,
        encode: E,
        options: &WriteOptions,
    ) -> RecordSetResult<AggregateWriteResult>
    where
        E: Fn(&T) -> Vec<SqlValue>,
    {
        self.scheduler
            .schedule(records, statement, encode, options)
            .await
    }
}
