//! Input validation for reads and writes
//!
//! Everything here runs before any I/O. Failures are always
//! [`RecordSetError::ValidationError`] and are never retried.

use crate::database::SqlValue;
use crate::error::{RecordSetError, RecordSetResult};
use crate::writer::WriteOptions;
use serde_json::Value;

/// Maximum allowed size for a JSON parameter value (1MB)
const MAX_JSON_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum nesting depth for JSON parameter values
const MAX_JSON_DEPTH: usize = 10;

/// Validates query text before it is sent to the data source
pub fn validate_query_text(query: &str) -> RecordSetResult<()> {
    if query.trim().is_empty() {
        return Err(RecordSetError::ValidationError(
            "query text must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates a parameterized statement template
pub fn validate_statement_text(statement: &str) -> RecordSetResult<()> {
    if statement.trim().is_empty() {
        return Err(RecordSetError::ValidationError(
            "parameterized statement must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates one encoded parameter row
///
/// `batch_index` and `position` identify the record that produced the row.
pub fn validate_parameters(
    params: &[SqlValue],
    batch_index: usize,
    position: usize,
) -> RecordSetResult<()> {
    if params.is_empty() {
        return Err(RecordSetError::ValidationError(format!(
            "encoder returned an empty parameter array for record {position} of batch {batch_index}"
        )));
    }

    for value in params {
        if let SqlValue::Json(json) = value {
            validate_json_parameter(json)?;
        }
    }

    Ok(())
}

/// Validates options for the concurrent write path
pub fn validate_write_options(options: &WriteOptions) -> RecordSetResult<()> {
    if options.batch_size == 0 {
        // Single synchronous batch; workers and deadline are unused
        return Ok(());
    }

    if options.worker_count == 0 {
        return Err(RecordSetError::ValidationError(
            "worker_count must be positive when batching".to_string(),
        ));
    }

    if options.timeout.is_zero() {
        return Err(RecordSetError::ValidationError(
            "timeout must be positive when batching".to_string(),
        ));
    }

    Ok(())
}

fn validate_json_parameter(value: &Value) -> RecordSetResult<()> {
    let serialized = serde_json::to_string(value).map_err(|e| {
        RecordSetError::ValidationError(format!("Invalid JSON parameter: {e}"))
    })?;

    if serialized.len() > MAX_JSON_SIZE_BYTES {
        return Err(RecordSetError::ValidationError(format!(
            "JSON parameter too large: {} bytes (max: {})",
            serialized.len(),
            MAX_JSON_SIZE_BYTES
        )));
    }

    validate_json_depth(value, 0)
}

fn validate_json_depth(value: &Value, current_depth: usize) -> RecordSetResult<()> {
    if current_depth > MAX_JSON_DEPTH {
        return Err(RecordSetError::ValidationError(format!(
            "JSON parameter nesting too deep: {current_depth} (max: {MAX_JSON_DEPTH})"
        )));
    }

    match value {
        Value::Object(map) => {
            for val in map.values() {
                validate_json_depth(val, current_depth + 1)?;
            }
        }
        Value::Array(arr) => {
            for item in arr {
                validate_json_depth(item, current_depth + 1)?;
            }
        }
        _ => {}
    }

    Ok(())
}
