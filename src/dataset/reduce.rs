//! Uniqueness reduction of per-ping configuration fields

use crate::common::{ParseError, ParseResult};

/// Number of distinct values in `values`
pub fn distinct_count<T: PartialEq>(values: &[T]) -> usize {
    let mut seen: Vec<&T> = Vec::new();
    for v in values {
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen.len()
}

/// Collapse a per-ping column that must hold a single value
///
/// Returns `None` for an empty column. More than one distinct value is a
/// configuration-inconsistency error naming `field`.
pub fn collapse<T: PartialEq + Clone>(
    field: &'static str,
    values: &[T],
) -> ParseResult<Option<T>> {
    match distinct_count(values) {
        0 => Ok(None),
        1 => Ok(values.first().cloned()),
        distinct => Err(ParseError::inconsistent(field, distinct)),
    }
}
