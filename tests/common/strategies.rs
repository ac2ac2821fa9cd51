use proptest::prelude::*;

/// Strategy for record sequences of arbitrary length
pub fn record_sequence_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(any::<u32>(), 0..500)
}

/// Strategy for positive batch sizes
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    1usize..=64
}

/// Strategy for per-batch results: `Some(rows)` on success, `None` on failure
pub fn batch_result_strategy() -> impl Strategy<Value = Vec<Option<u64>>> {
    prop::collection::vec(prop::option::weighted(0.8, 0u64..10_000), 0..40)
}
