//! # Write Scheduler
//!
//! ## Architecture: Bounded Fan-Out With a Deadline Join
//!
//! A batched write partitions the input, prepares one [`BatchWriteUnit`] per
//! batch on the calling task, then spawns every unit into a per-call
//! [`JoinSet`]. A [`Semaphore`] with `worker_count` permits bounds how many
//! units execute at once; each executing unit checks out its own session
//! from the data source. Outcomes are collected as units finish, in any
//! order, until every unit has reported or the deadline elapses.
//!
//! ## Deadline Semantics
//!
//! Units are never interrupted. When the deadline elapses the remaining
//! tasks are detached: they keep running in the background (a started
//! batch still commits or fails server-side) but their outcomes are no
//! longer collected. The number of such units is reported as
//! [`AggregateWriteResult::pending_batches`].
//!
//! ## Unbatched Path
//!
//! A `batch_size` of zero writes every record as one synchronous batch on
//! the calling task; failures propagate immediately as
//! [`RecordSetError::WriteError`] with no aggregation.

use super::aggregator::{AggregateWriteResult, ResultAggregator, WriteOutcome};
use super::batcher::partition;
use super::unit::BatchWriteUnit;
use crate::config::WriteConfig;
use crate::database::{DataSource, SqlValue};
use crate::error::{RecordSetError, RecordSetResult};
use crate::validation::{validate_statement_text, validate_write_options};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};

/// Batching parameters for one write call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Records per batch; 0 means one synchronous batch
    pub batch_size: usize,
    /// Maximum number of batches executing at once
    pub worker_count: usize,
    /// How long the caller waits for all batches
    pub timeout: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions::from(&WriteConfig::default())
    }
}

impl WriteOptions {
    pub fn unbatched() -> Self {
        Self {
            batch_size: 0,
            ..Self::default()
        }
    }

    pub fn new(batch_size: usize, worker_count: usize, timeout: Duration) -> Self {
        Self {
            batch_size,
            worker_count,
            timeout,
        }
    }
}

/// Runs batched writes against a shared data source
pub struct WriteScheduler<D: DataSource> {
    source: Arc<D>,
}

impl<D: DataSource> Clone for WriteScheduler<D> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<D: DataSource> std::fmt::Debug for WriteScheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteScheduler")
            .field("max_sessions", &self.source.max_sessions())
            .finish()
    }
}

impl<D: DataSource> WriteScheduler<D> {
    pub fn new(source: Arc<D>) -> Self {
        Self { source }
    }

    /// Write every record as one synchronous batch and return rows affected
    pub async fn write_single<T, E>(
        &self,
        records: &[T],
        statement: &str,
        encode: E,
    ) -> RecordSetResult<u64>
    where
        E: Fn(&T) -> Vec<SqlValue>,
    {
        validate_statement_text(statement)?;

        let batches = partition(records, 0);
        let unit = BatchWriteUnit::prepare(&batches[0], encode)?;

        unit.write(self.source.as_ref(), statement)
            .await
            .map_err(|e| RecordSetError::WriteError {
                source: e.into_root_cause(),
            })
    }

    /// Write `records` per `options` and return the raw aggregate
    ///
    /// Only validation errors and unbatched-path failures are returned as
    /// `Err`; per-batch failures are counted in the aggregate.
    #[instrument(skip_all, fields(records = records.len(), batch_size = options.batch_size))]
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
        validate_statement_text(statement)?;
        validate_write_options(options)?;

        if options.batch_size == 0 {
            let rows_affected = self.write_single(records, statement, encode).await?;
            return Ok(AggregateWriteResult {
                submitted_batches: 1,
                rows_affected,
                ..AggregateWriteResult::default()
            });
        }

        // Encode and validate everything before the first unit is submitted
        let units = partition(records, options.batch_size)
            .iter()
            .map(|batch| BatchWriteUnit::prepare(batch, &encode))
            .collect::<RecordSetResult<Vec<_>>>()?;

        if let Some(max_sessions) = self.source.max_sessions() {
            if max_sessions < options.worker_count {
                warn!(
                    max_sessions,
                    worker_count = options.worker_count,
                    "Data source has fewer sessions than batch writers; writers will queue"
                );
            }
        }

        info!(
            batches = units.len(),
            worker_count = options.worker_count,
            "Submitting batch writers"
        );

        let statement: Arc<str> = Arc::from(statement);
        let permits = Arc::new(Semaphore::new(options.worker_count));
        let mut workers = JoinSet::new();
        let mut batch_by_task = HashMap::with_capacity(units.len());

        for unit in units {
            let batch_index = unit.batch_index();
            let source = Arc::clone(&self.source);
            let statement = Arc::clone(&statement);
            let permits = Arc::clone(&permits);

            let handle = workers.spawn(async move {
                // The semaphore is never closed, so acquisition only fails on a bug
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return WriteOutcome::Failed {
                            batch_index,
                            cause: Box::new(e),
                        }
                    }
                };
                unit.run(source.as_ref(), &statement).await
            });
            batch_by_task.insert(handle.id(), batch_index);
        }

        let outcomes = collect_outcomes(&mut workers, &batch_by_task, options.timeout).await;
        let pending_batches = workers.len();
        if pending_batches > 0 {
            warn!(
                pending_batches,
                timeout_ms = options.timeout.as_millis() as u64,
                "Write deadline elapsed; remaining batch writers continue in the background"
            );
            workers.detach_all();
        }

        Ok(ResultAggregator::reduce(outcomes, pending_batches))
    }

    /// Write `records` per `options` and return the total rows affected
    ///
    /// Fails with [`RecordSetError::BatchWriteFailure`] if any batch failed and
    /// with [`RecordSetError::WriteIncomplete`] if the deadline elapsed first.
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
        let result = self.schedule(records, statement, encode, options).await?;
        ResultAggregator::finalize(result)
    }
}

/// Join finished workers until none remain or `timeout` elapses
async fn collect_outcomes(
    workers: &mut JoinSet<WriteOutcome>,
    batch_by_task: &HashMap<tokio::task::Id, usize>,
    timeout: Duration,
) -> Vec<WriteOutcome> {
    let deadline = Instant::now() + timeout;
    let mut outcomes = Vec::with_capacity(workers.len());

    loop {
        match timeout_at(deadline, workers.join_next_with_id()).await {
            Ok(Some(Ok((_, outcome)))) => outcomes.push(outcome),
            Ok(Some(Err(join_error))) => {
                // A panicking unit still yields an outcome for its batch
                let batch_index = batch_by_task
                    .get(&join_error.id())
                    .copied()
                    .unwrap_or_default();
                outcomes.push(WriteOutcome::Failed {
                    batch_index,
                    cause: Box::new(join_error),
                });
            }
            Ok(None) | Err(_) => break,
        }
    }

    outcomes
}
