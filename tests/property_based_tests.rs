mod common;

use common::strategies::*;
use proptest::prelude::*;
use recordset::database::MemoryFailure;
use recordset::writer::{partition, ResultAggregator, WriteOutcome};

fn outcomes_from(results: &[Option<u64>]) -> Vec<WriteOutcome> {
    results
        .iter()
        .enumerate()
        .map(|(batch_index, result)| match result {
            Some(rows_affected) => WriteOutcome::Written {
                batch_index,
                rows_affected: *rows_affected,
            },
            None => WriteOutcome::Failed {
                batch_index,
                cause: Box::new(MemoryFailure(format!("batch {batch_index} failed"))),
            },
        })
        .collect()
}

proptest! {
    /// Property: concatenating batches in order reproduces the input
    #[test]
    fn partition_concatenation_reproduces_input(
        records in record_sequence_strategy(),
        batch_size in batch_size_strategy(),
    ) {
        let batches = partition(&records, batch_size);
        let rebuilt: Vec<u32> = batches
            .iter()
            .flat_map(|batch| batch.records().iter().copied())
            .collect();

        prop_assert_eq!(rebuilt, records.clone());
        prop_assert_eq!(batches.len(), records.len().div_ceil(batch_size));
    }

    /// Property: only the final batch may be shorter than the batch size
    #[test]
    fn only_final_batch_is_short(
        records in record_sequence_strategy(),
        batch_size in batch_size_strategy(),
    ) {
        let batches = partition(&records, batch_size);
        for (position, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.index(), position);
            prop_assert!(!batch.is_empty());
            if position + 1 < batches.len() {
                prop_assert_eq!(batch.len(), batch_size);
            } else {
                prop_assert!(batch.len() <= batch_size);
            }
        }
    }

    /// Property: a zero batch size yields exactly one batch equal to the input
    #[test]
    fn zero_batch_size_is_single_batch(records in record_sequence_strategy()) {
        let batches = partition(&records, 0);
        prop_assert_eq!(batches.len(), 1);
        prop_assert_eq!(batches[0].records(), records.as_slice());
    }

    /// Property: reduction does not depend on outcome order
    #[test]
    fn reduce_is_order_independent(results in batch_result_strategy()) {
        let forward = ResultAggregator::reduce(outcomes_from(&results), 0);

        let mut reversed_results = results.clone();
        reversed_results.reverse();
        let reversed = ResultAggregator::reduce(outcomes_from(&reversed_results), 0);

        let mut rotated_results = results.clone();
        if !rotated_results.is_empty() {
            let mid = rotated_results.len() / 2;
            rotated_results.rotate_left(mid);
        }
        let rotated = ResultAggregator::reduce(outcomes_from(&rotated_results), 0);

        prop_assert_eq!(forward, reversed);
        prop_assert_eq!(forward, rotated);
    }

    /// Property: totals count successful rows only and every failure once
    #[test]
    fn reduce_totals_match_outcomes(results in batch_result_strategy()) {
        let aggregate = ResultAggregator::reduce(outcomes_from(&results), 0);

        let expected_rows: u64 = results.iter().flatten().sum();
        let expected_failures = results.iter().filter(|r| r.is_none()).count();

        prop_assert_eq!(aggregate.rows_affected, expected_rows);
        prop_assert_eq!(aggregate.failed_batches, expected_failures);
        prop_assert_eq!(aggregate.submitted_batches, results.len());
        prop_assert_eq!(ResultAggregator::finalize(aggregate).is_ok(), expected_failures == 0);
    }
}
