//! # Batched Writes
//!
//! Records flow one way: partitioned into batches ([`batcher`]), each batch
//! encoded and executed as one unit ([`unit`]), units fanned out over a
//! bounded set of workers ([`scheduler`]) and their outcomes folded into one
//! result ([`aggregator`]).
//!
//! Batches are not transactionally linked. When one batch fails the call
//! fails, but batches that already succeeded stay written.

pub mod aggregator;
pub mod batcher;
pub mod scheduler;
pub mod unit;

pub use aggregator::{AggregateWriteResult, ResultAggregator, WriteOutcome};
pub use batcher::{partition, Batch};
pub use scheduler::{WriteOptions, WriteScheduler};
pub use unit::{sum_update_counts, BatchWriteUnit};
