//! # Batch Write Unit
//!
//! One batch's worth of encoded parameter rows bound to a parameterized
//! statement. A unit is built in two steps:
//!
//! 1. [`BatchWriteUnit::prepare`] encodes every record and validates the
//!    parameter rows. Nothing touches the data source yet, so an empty
//!    parameter array fails the batch before any binding happens.
//! 2. [`BatchWriteUnit::run`] checks a session out of the data source,
//!    executes the batch in one call and reports a [`WriteOutcome`].
//!
//! A unit never retries and never shares its session with another unit.

use super::aggregator::WriteOutcome;
use super::batcher::Batch;
use crate::database::{DataSource, DataSourceError, Session, SqlValue, UpdateCount};
use crate::error::RecordSetResult;
use crate::validation::validate_parameters;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteUnit {
    batch_index: usize,
    params: Vec<Vec<SqlValue>>,
}

impl BatchWriteUnit {
    /// Encode and validate every record of `batch`
    pub fn prepare<T, E>(batch: &Batch<'_, T>, encode: E) -> RecordSetResult<Self>
    where
        E: Fn(&T) -> Vec<SqlValue>,
    {
        let params = batch
            .records()
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let row = encode(record);
                validate_parameters(&row, batch.index(), position)?;
                Ok(row)
            })
            .collect::<RecordSetResult<Vec<_>>>()?;

        Ok(Self {
            batch_index: batch.index(),
            params,
        })
    }

    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[Vec<SqlValue>] {
        &self.params
    }

    /// Execute on an already checked-out session and return rows affected
    pub async fn execute<S>(&self, session: &mut S, statement: &str) -> Result<u64, DataSourceError>
    where
        S: Session,
    {
        info!(
            batch_index = self.batch_index,
            "Executing batch of {} records",
            self.params.len()
        );

        let counts = session.execute_batch(statement, &self.params).await?;
        let rows_affected = sum_update_counts(&counts);

        info!(
            batch_index = self.batch_index,
            "{} records affected during database operation", rows_affected
        );
        Ok(rows_affected)
    }

    /// Check out a session, execute, and capture the result as an outcome
    pub async fn run<D>(self, source: &D, statement: &str) -> WriteOutcome
    where
        D: DataSource,
    {
        let batch_index = self.batch_index;

        match self.write(source, statement).await {
            Ok(rows_affected) => WriteOutcome::Written {
                batch_index,
                rows_affected,
            },
            Err(e) => {
                let cause = e.into_root_cause();
                error!(batch_index, error = %cause, "Batch writer error");
                WriteOutcome::Failed { batch_index, cause }
            }
        }
    }

    /// Check out a session and execute, propagating any failure
    pub async fn write<D>(&self, source: &D, statement: &str) -> Result<u64, DataSourceError>
    where
        D: DataSource,
    {
        if self.params.is_empty() {
            debug!(batch_index = self.batch_index, "Skipping empty batch");
            return Ok(0);
        }

        let mut session = source.acquire().await?;
        self.execute(&mut session, statement).await
    }
}

/// Sum per-row update counts; unknown counts contribute nothing
pub fn sum_update_counts(counts: &[UpdateCount]) -> u64 {
    counts.iter().map(|count| count.rows()).sum()
}
