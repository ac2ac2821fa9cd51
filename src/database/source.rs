//! # Data Source Seam
//!
//! The record reader and the batch writers never talk to a driver directly.
//! They check sessions out of a [`DataSource`] and use the two operations a
//! [`Session`] offers: streaming a query's rows and executing one batch of
//! bound parameter rows against a parameterized statement.
//!
//! Sessions are scoped: dropping one returns it to its source, and dropping
//! the row stream returned by [`Session::fetch`] releases the result cursor.
//! Concurrent batch writers each hold their own session; a session is never
//! shared between two units of work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Boxed, thread-safe error used for caller callbacks and driver causes
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A relational data source that hands out sessions for scoped use
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Raw row type handed to record decoders
    type Row: Send + 'static;

    /// Session type checked out by [`DataSource::acquire`]
    type Session: Session<Row = Self::Row> + 'static;

    /// Check out a session; it is released when dropped
    async fn acquire(&self) -> Result<Self::Session, DataSourceError>;

    /// Upper bound on concurrently checked-out sessions, when the source knows it
    fn max_sessions(&self) -> Option<usize> {
        None
    }
}

/// One checked-out connection/session
#[async_trait]
pub trait Session: Send {
    type Row: Send + 'static;

    /// Execute `query` and stream its rows in cursor order
    fn fetch<'s>(&'s mut self, query: &'s str) -> BoxStream<'s, Result<Self::Row, DataSourceError>>;

    /// Bind every parameter row to `statement` and execute them as one batch
    ///
    /// Returns one update count per parameter row, in order.
    async fn execute_batch(
        &mut self,
        statement: &str,
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<UpdateCount>, DataSourceError>;
}

/// Per-row update count reported by a batch execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateCount {
    Rows(u64),
    /// The driver executed the row but did not report how many rows it touched
    Unknown,
}

impl UpdateCount {
    /// Rows contributed to a batch total; unknown counts contribute zero
    pub fn rows(self) -> u64 {
        match self {
            UpdateCount::Rows(rows) => rows,
            UpdateCount::Unknown => 0,
        }
    }
}

/// A positional statement parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(i64::from(*v)),
            SqlValue::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(value.into())
                }
            }
        )*
    };
}

sql_value_from! {
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    f64 => Double,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    serde_json::Value => Json,
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Failures raised by a data source or one of its sessions
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("Failed to acquire session: {0}")]
    Acquire(#[source] BoxError),

    #[error("Query failed: {0}")]
    Query(#[source] BoxError),

    /// A batch was rejected; `next` carries the driver's chained root cause
    #[error("Batch execution failed: {message}")]
    BatchExecution {
        message: String,
        #[source]
        next: Option<BoxError>,
    },
}

impl DataSourceError {
    pub fn batch(message: impl Into<String>, next: impl Into<BoxError>) -> Self {
        DataSourceError::BatchExecution {
            message: message.into(),
            next: Some(next.into()),
        }
    }

    /// The chained cause when the error carries one, otherwise the error itself
    pub fn into_root_cause(self) -> BoxError {
        match self {
            DataSourceError::BatchExecution {
                next: Some(next), ..
            } => next,
            other => Box::new(other),
        }
    }
}
