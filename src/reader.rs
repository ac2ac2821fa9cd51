//! # Record Reader
//!
//! Executes a read query once and decodes its rows, in cursor order, into a
//! list, a unique key map, or a key-grouped multimap. Decoding is
//! sequential on the calling task. The result cursor and the session are
//! released whether the read succeeds or fails.

use crate::database::{BoxError, DataSource, DataSourceError, Session};
use crate::error::{RecordSetError, RecordSetResult};
use crate::validation::validate_query_text;
use futures::TryStreamExt;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::info;

pub struct RecordReader<D: DataSource> {
    source: Arc<D>,
}

impl<D: DataSource> Clone for RecordReader<D> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<D: DataSource> RecordReader<D> {
    pub fn new(source: Arc<D>) -> Self {
        Self { source }
    }

    /// Decode every row into a list, preserving cursor order
    pub async fn read_all<T, F, E>(&self, query: &str, decode: F) -> RecordSetResult<Vec<T>>
    where
        F: Fn(&D::Row) -> Result<T, E>,
        E: Into<BoxError>,
    {
        let mut records = Vec::new();
        self.scan(query, decode, |record| {
            records.push(record);
            Ok(())
        })
        .await?;

        info!("Read {} records", records.len());
        Ok(records)
    }

    /// Decode every row into a map keyed by `key_of`
    ///
    /// Keys must be unique: a repeated key fails the read with
    /// [`RecordSetError::DuplicateKeyError`] instead of overwriting.
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
        let mut records = HashMap::new();
        self.scan(query, decode, |record| match records.entry(key_of(&record)) {
            Entry::Occupied(entry) => Err(RecordSetError::DuplicateKeyError {
                key: format!("{:?}", entry.key()),
            }),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        })
        .await?;

        info!("Read {} records", records.len());
        Ok(records)
    }

    /// Decode every row and group records by `key_of`
    ///
    /// Within each group records keep the order the cursor produced them in.
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
        let mut groups: HashMap<K, Vec<T>> = HashMap::new();
        let record_count = self
            .scan(query, decode, |record| {
                groups.entry(key_of(&record)).or_default().push(record);
                Ok(())
            })
            .await?;

        info!("Read {} records", record_count);
        Ok(groups)
    }

    /// Run `query` once and hand each decoded record to `collect`
    async fn scan<T, F, E, C>(&self, query: &str, decode: F, mut collect: C) -> RecordSetResult<usize>
    where
        F: Fn(&D::Row) -> Result<T, E>,
        E: Into<BoxError>,
        C: FnMut(T) -> RecordSetResult<()>,
    {
        validate_query_text(query)?;
        info!("Executing query: {}", query);

        let query_error = |source: DataSourceError| RecordSetError::QueryExecutionError {
            query: query.to_string(),
            source,
        };

        let mut session = self.source.acquire().await.map_err(query_error)?;
        let mut cursor = session.fetch(query);

        let mut row_index = 0;
        while let Some(row) = cursor.try_next().await.map_err(query_error)? {
            let record = decode(&row).map_err(|e| RecordSetError::DecodeError {
                row_index,
                source: e.into(),
            })?;
            collect(record)?;
            row_index += 1;
        }

        Ok(row_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryDataSource, MemoryFailure, MemoryRow, SqlValue};

    const QUERY: &str = "SELECT id, category FROM widgets ORDER BY id";

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: i64,
        category: String,
    }

    fn decode_widget(row: &MemoryRow) -> Result<Widget, MemoryFailure> {
        match (row.get(0), row.get(1)) {
            (Some(SqlValue::BigInt(id)), Some(SqlValue::Text(category))) => Ok(Widget {
                id: *id,
                category: category.clone(),
            }),
            _ => Err(MemoryFailure(format!("unexpected row shape: {row:?}"))),
        }
    }

    fn widget_row(id: i64, category: &str) -> MemoryRow {
        MemoryRow::new(vec![SqlValue::BigInt(id), SqlValue::from(category)])
    }

    fn reader(source: &MemoryDataSource) -> RecordReader<MemoryDataSource> {
        RecordReader::new(Arc::new(source.clone()))
    }

    #[tokio::test]
    async fn test_read_all_preserves_cursor_order() {
        let source = MemoryDataSource::new().with_query_result(
            QUERY,
            vec![widget_row(3, "gear"), widget_row(1, "bolt"), widget_row(2, "gear")],
        );

        let widgets = reader(&source).read_all(QUERY, decode_widget).await.unwrap();

        let ids: Vec<i64> = widgets.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(source.open_cursors(), 0);
        assert_eq!(source.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_read_all_as_map_rejects_duplicate_keys() {
        let source = MemoryDataSource::new()
            .with_query_result(QUERY, vec![widget_row(1, "gear"), widget_row(2, "gear")]);

        let result = reader(&source)
            .read_all_as_map(QUERY, decode_widget, |w| w.category.clone())
            .await;

        match result {
            Err(RecordSetError::DuplicateKeyError { key }) => assert_eq!(key, "\"gear\""),
            other => panic!("expected duplicate key error, got {other:?}"),
        }
        assert_eq!(source.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_read_all_as_multimap_groups_in_order() {
        let source = MemoryDataSource::new().with_query_result(
            QUERY,
            vec![widget_row(1, "gear"), widget_row(2, "bolt"), widget_row(3, "gear")],
        );

        let groups = reader(&source)
            .read_all_as_multimap(QUERY, decode_widget, |w| w.category.clone())
            .await
            .unwrap();

        let gear_ids: Vec<i64> = groups["gear"].iter().map(|w| w.id).collect();
        assert_eq!(gear_ids, vec![1, 3]);
        assert_eq!(groups["bolt"].len(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_is_wrapped_and_cursor_released() {
        let source = MemoryDataSource::new().with_failing_query(QUERY, "relation does not exist");

        let result = reader(&source).read_all(QUERY, decode_widget).await;

        match result {
            Err(RecordSetError::QueryExecutionError { query, source: cause }) => {
                assert_eq!(query, QUERY);
                assert!(cause.to_string().contains("relation does not exist"));
            }
            other => panic!("expected query execution error, got {other:?}"),
        }
        assert_eq!(source.open_cursors(), 0);
        assert_eq!(source.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_reports_row_index() {
        let source = MemoryDataSource::new().with_query_result(
            QUERY,
            vec![widget_row(1, "gear"), MemoryRow::new(vec![SqlValue::Null])],
        );

        let result = reader(&source).read_all(QUERY, decode_widget).await;

        assert!(matches!(
            result,
            Err(RecordSetError::DecodeError { row_index: 1, .. })
        ));
        assert_eq!(source.open_cursors(), 0);
    }
}
