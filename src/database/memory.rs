//! # In-Memory Data Source
//!
//! A [`DataSource`] that keeps everything in process memory. Query results are
//! registered up front by query text, writes are recorded as
//! [`ExecutedBatch`] entries, and failures are scripted. It tracks session
//! and cursor bookkeeping so tests can assert that resources are released
//! and that concurrent writers never exceed their bound.
//!
//! ```rust
//! use recordset::database::{MemoryDataSource, MemoryRow, SqlValue};
//!
//! let source = MemoryDataSource::new().with_query_result(
//!     "SELECT id, name FROM widgets",
//!     vec![MemoryRow::new(vec![SqlValue::BigInt(1), SqlValue::from("sprocket")])],
//! );
//! assert_eq!(source.executed_batches().len(), 0);
//! ```

use super::source::{DataSource, DataSourceError, Session, SqlValue, UpdateCount};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

type RowPredicate = Arc<dyn Fn(&[SqlValue]) -> bool + Send + Sync>;

/// A row returned by [`MemoryDataSource`]: positional column values
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    values: Vec<SqlValue>,
}

impl MemoryRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Column value by 0-based position
    pub fn get(&self, column: usize) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// A batch the in-memory source executed successfully
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedBatch {
    pub statement: String,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Error raised by scripted failures
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MemoryFailure(pub String);

#[derive(Default)]
struct MemoryState {
    query_results: Mutex<HashMap<String, Vec<MemoryRow>>>,
    failing_queries: Mutex<HashMap<String, String>>,
    failing_rows: Mutex<Option<RowPredicate>>,
    executed: Mutex<Vec<ExecutedBatch>>,
    execution_delay: Mutex<Option<Duration>>,
    unknown_counts: AtomicBool,
    acquisitions: AtomicUsize,
    live_sessions: AtomicUsize,
    peak_sessions: AtomicUsize,
    open_cursors: AtomicUsize,
}

/// In-memory [`DataSource`]; clones share state
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    state: Arc<MemoryState>,
}

impl std::fmt::Debug for MemoryDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDataSource")
            .field("queries", &self.state.query_results.lock().len())
            .field("executed_batches", &self.state.executed.lock().len())
            .field("live_sessions", &self.live_sessions())
            .field("open_cursors", &self.open_cursors())
            .finish()
    }
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rows `query` returns
    pub fn with_query_result(self, query: impl Into<String>, rows: Vec<MemoryRow>) -> Self {
        self.state.query_results.lock().insert(query.into(), rows);
        self
    }

    /// Make `query` fail when executed
    pub fn with_failing_query(self, query: impl Into<String>, message: impl Into<String>) -> Self {
        self.state
            .failing_queries
            .lock()
            .insert(query.into(), message.into());
        self
    }

    /// Fail every batch that contains a parameter row matching `predicate`
    pub fn with_failing_rows<P>(self, predicate: P) -> Self
    where
        P: Fn(&[SqlValue]) -> bool + Send + Sync + 'static,
    {
        *self.state.failing_rows.lock() = Some(Arc::new(predicate));
        self
    }

    /// Sleep for `delay` inside every batch execution
    pub fn with_execution_delay(self, delay: Duration) -> Self {
        *self.state.execution_delay.lock() = Some(delay);
        self
    }

    /// Report [`UpdateCount::Unknown`] instead of one row per parameter row
    pub fn reporting_unknown_counts(self) -> Self {
        self.state.unknown_counts.store(true, Ordering::SeqCst);
        self
    }

    /// Batches executed so far, in completion order
    pub fn executed_batches(&self) -> Vec<ExecutedBatch> {
        self.state.executed.lock().clone()
    }

    /// Every parameter row written so far, in completion order
    pub fn written_rows(&self) -> Vec<Vec<SqlValue>> {
        self.state
            .executed
            .lock()
            .iter()
            .flat_map(|batch| batch.rows.iter().cloned())
            .collect()
    }

    pub fn acquisitions(&self) -> usize {
        self.state.acquisitions.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.state.live_sessions.load(Ordering::SeqCst)
    }

    /// Highest number of sessions checked out at the same time
    pub fn peak_sessions(&self) -> usize {
        self.state.peak_sessions.load(Ordering::SeqCst)
    }

    pub fn open_cursors(&self) -> usize {
        self.state.open_cursors.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    type Row = MemoryRow;
    type Session = MemorySession;

    async fn acquire(&self) -> Result<MemorySession, DataSourceError> {
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_sessions.fetch_max(live, Ordering::SeqCst);
        debug!(live_sessions = live, "Checked out in-memory session");

        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session checked out of a [`MemoryDataSource`]
pub struct MemorySession {
    state: Arc<MemoryState>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.state.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for MemorySession {
    type Row = MemoryRow;

    fn fetch<'s>(&'s mut self, query: &'s str) -> BoxStream<'s, Result<MemoryRow, DataSourceError>> {
        let failure = self.state.failing_queries.lock().get(query).cloned();
        let rows = match failure {
            Some(message) => vec![Err(DataSourceError::Query(Box::new(MemoryFailure(message))))],
            None => self
                .state
                .query_results
                .lock()
                .get(query)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(Ok)
                .collect(),
        };

        self.state.open_cursors.fetch_add(1, Ordering::SeqCst);
        MemoryCursor {
            rows: rows.into_iter(),
            state: Arc::clone(&self.state),
        }
        .boxed()
    }

    async fn execute_batch(
        &mut self,
        statement: &str,
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<UpdateCount>, DataSourceError> {
        let delay = *self.state.execution_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let predicate = self.state.failing_rows.lock().clone();
        if let Some(predicate) = predicate {
            if let Some(position) = rows.iter().position(|row| predicate(row.as_slice())) {
                return Err(DataSourceError::batch(
                    format!("batch entry {position} was aborted"),
                    MemoryFailure(format!("row {position} rejected by scripted failure")),
                ));
            }
        }

        self.state.executed.lock().push(ExecutedBatch {
            statement: statement.to_string(),
            rows: rows.to_vec(),
        });

        let count = if self.state.unknown_counts.load(Ordering::SeqCst) {
            UpdateCount::Unknown
        } else {
            UpdateCount::Rows(1)
        };
        Ok(vec![count; rows.len()])
    }
}

struct MemoryCursor {
    rows: std::vec::IntoIter<Result<MemoryRow, DataSourceError>>,
    state: Arc<MemoryState>,
}

impl Stream for MemoryCursor {
    type Item = Result<MemoryRow, DataSourceError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.rows.next())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.state.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}
