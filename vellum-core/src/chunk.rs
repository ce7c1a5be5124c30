//! IN-list helpers bounded by the store's parameter ceiling

use crate::error::{Result, StoreError};
use rusqlite::types::Value as SqlValue;

/// Split `items` into groups that each fit in one statement alongside
/// `reserved` other parameters.
pub fn in_groups<T>(items: &[T], max_parameters: usize, reserved: usize) -> impl Iterator<Item = &[T]> {
    let size = max_parameters.saturating_sub(reserved).max(1);
    items.chunks(size)
}

/// Reject argument counts that a single, un-chunkable statement cannot take.
pub fn ensure_within_limit(count: usize, max_parameters: usize, what: &str) -> Result<()> {
    if count > max_parameters {
        return Err(StoreError::NotSupported(format!(
            "{} arguments for {} exceed the limit of {}",
            count, what, max_parameters
        )));
    }
    Ok(())
}

/// `?, ?, ?` placeholder list for `n` parameters.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Integers as bindable SQL values.
pub fn int_values<I: Copy + Into<i64>>(ids: &[I]) -> Vec<SqlValue> {
    ids.iter().map(|&i| SqlValue::Integer(i.into())).collect()
}
