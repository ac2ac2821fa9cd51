//! Partitioning of a record sequence into ordered, fixed-size batches.

/// A contiguous, ordered slice of the input records
#[derive(Debug)]
pub struct Batch<'a, T> {
    index: usize,
    records: &'a [T],
}

impl<'a, T> Batch<'a, T> {
    /// Position of this batch in submission order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn records(&self) -> &'a [T] {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split `records` into batches of at most `batch_size` records
///
/// A `batch_size` of zero yields exactly one batch holding the whole input.
/// Otherwise batches preserve input order and only the last one may be short;
/// an empty input yields no batches.
pub fn partition<T>(records: &[T], batch_size: usize) -> Vec<Batch<'_, T>> {
    if batch_size == 0 {
        return vec![Batch { index: 0, records }];
    }

    records
        .chunks(batch_size)
        .enumerate()
        .map(|(index, records)| Batch { index, records })
        .collect()
}
