//! Reduction of per-batch outcomes into one caller-visible result.

use crate::database::BoxError;
use crate::error::{RecordSetError, RecordSetResult};
use serde::Serialize;
use tracing::{error, info, warn};

/// Result of one batch write unit
#[derive(Debug)]
pub enum WriteOutcome {
    Written {
        batch_index: usize,
        rows_affected: u64,
    },
    Failed {
        batch_index: usize,
        cause: BoxError,
    },
}

impl WriteOutcome {
    pub fn batch_index(&self) -> usize {
        match self {
            WriteOutcome::Written { batch_index, .. } | WriteOutcome::Failed { batch_index, .. } => {
                *batch_index
            }
        }
    }

    /// Rows written by this batch; a failed batch carries none
    pub fn rows_affected(&self) -> u64 {
        match self {
            WriteOutcome::Written { rows_affected, .. } => *rows_affected,
            WriteOutcome::Failed { .. } => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WriteOutcome::Failed { .. })
    }
}

/// Reduction of all outcomes of one write call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateWriteResult {
    pub submitted_batches: usize,
    pub rows_affected: u64,
    pub failed_batches: usize,
    /// Batches still running when the deadline elapsed; never collected
    pub pending_batches: usize,
}

impl AggregateWriteResult {
    pub fn completed_batches(&self) -> usize {
        self.submitted_batches - self.pending_batches
    }

    pub fn is_complete(&self) -> bool {
        self.pending_batches == 0
    }

    pub fn is_success(&self) -> bool {
        self.failed_batches == 0 && self.pending_batches == 0
    }
}

/// Zero-state reducer over [`WriteOutcome`]s
#[derive(Debug)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Sum rows and count failures; independent of outcome order
    ///
    /// Each failure's cause is logged here since the aggregate only keeps counts.
    pub fn reduce<I>(outcomes: I, pending_batches: usize) -> AggregateWriteResult
    where
        I: IntoIterator<Item = WriteOutcome>,
    {
        let mut result = AggregateWriteResult {
            pending_batches,
            submitted_batches: pending_batches,
            ..AggregateWriteResult::default()
        };

        for outcome in outcomes {
            result.submitted_batches += 1;
            result.rows_affected += outcome.rows_affected();

            if let WriteOutcome::Failed { batch_index, cause } = &outcome {
                error!(
                    batch_index = *batch_index,
                    error = %cause,
                    "Batch writer failed due to error"
                );
                result.failed_batches += 1;
            }
        }

        result
    }

    /// Turn an aggregate into the caller's row count or a fatal error
    ///
    /// Any failed batch fails the whole call even though the batches that
    /// succeeded stay written; the error carries the partial total.
    pub fn finalize(result: AggregateWriteResult) -> RecordSetResult<u64> {
        if result.failed_batches > 0 {
            return Err(RecordSetError::BatchWriteFailure {
                failed_batches: result.failed_batches,
                rows_affected: result.rows_affected,
                pending_batches: result.pending_batches,
            });
        }

        if result.pending_batches > 0 {
            warn!(
                pending_batches = result.pending_batches,
                rows_affected = result.rows_affected,
                "Write deadline elapsed with batches still running"
            );
            return Err(RecordSetError::WriteIncomplete {
                pending_batches: result.pending_batches,
                rows_affected: result.rows_affected,
            });
        }

        info!(
            batches = result.submitted_batches,
            rows_affected = result.rows_affected,
            "Batched write completed"
        );
        Ok(result.rows_affected)
    }
}
