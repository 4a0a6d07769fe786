//! Individual cleaning rules.
//!
//! Each rule takes a frame and returns the cleaned frame together with the
//! number of rows removed (or cells changed, for sentinel normalization).
//! Row order is preserved by every rule.

use crate::utils::{DtypeCategory, get_dtype_category, string_values};
use polars::prelude::*;
use std::collections::HashSet;

fn keep_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<(DataFrame, usize)> {
    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return Ok((df.clone(), 0));
    }
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    Ok((df.filter(&mask)?, removed))
}

/// Mask that is true for the first row of every distinct key.
fn first_occurrences(keys: impl Iterator<Item = Vec<Option<String>>>) -> Vec<bool> {
    let mut seen = HashSet::new();
    keys.map(|key| seen.insert(key)).collect()
}

/// Remove rows identical in every column to an earlier row.
pub fn drop_exact_duplicates(df: &DataFrame) -> PolarsResult<(DataFrame, usize)> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| string_values(c.as_materialized_series()))
        .collect::<PolarsResult<Vec<_>>>()?;

    let keep = first_occurrences(
        (0..df.height()).map(|row| columns.iter().map(|col| col[row].clone()).collect()),
    );
    keep_rows(df, &keep)
}

/// Remove rows whose `column` repeats an earlier row's value.
pub fn drop_duplicate_keys(df: &DataFrame, column: &str) -> PolarsResult<(DataFrame, usize)> {
    let values = string_values(df.column(column)?.as_materialized_series())?;
    let keep = first_occurrences(values.into_iter().map(|v| vec![v]));
    keep_rows(df, &keep)
}

/// Replace text cells equal to `sentinel` with missing values.
pub fn normalize_sentinel(df: &DataFrame, sentinel: &str) -> PolarsResult<(DataFrame, usize)> {
    let mut out = df.clone();
    let mut replaced = 0;

    for column in df.get_columns() {
        if get_dtype_category(column.dtype()) != DtypeCategory::String {
            continue;
        }
        let values = string_values(column.as_materialized_series())?;
        let hits = values
            .iter()
            .filter(|v| v.as_deref() == Some(sentinel))
            .count();
        if hits == 0 {
            continue;
        }

        let cleaned: Vec<Option<String>> = values
            .into_iter()
            .map(|v| v.filter(|s| s != sentinel))
            .collect();
        out.replace(column.name().as_str(), Series::new(column.name().clone(), cleaned))?;
        replaced += hits;
    }

    Ok((out, replaced))
}

/// Remove rows where `column` is missing.
pub fn drop_missing(df: &DataFrame, column: &str) -> PolarsResult<(DataFrame, usize)> {
    let keep: Vec<bool> = df
        .column(column)?
        .as_materialized_series()
        .is_not_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect();
    keep_rows(df, &keep)
}

/// Remove rows whose integer code in `column` is one of `codes`.
///
/// Missing values and values that do not parse as integers are kept.
pub fn drop_codes(df: &DataFrame, column: &str, codes: &[i64]) -> PolarsResult<(DataFrame, usize)> {
    let values = df
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let keep: Vec<bool> = values
        .i64()?
        .into_iter()
        .map(|v| v.is_none_or(|code| !codes.contains(&code)))
        .collect();
    keep_rows(df, &keep)
}

/// Keep only rows whose `column` holds one of `allowed`. Missing values are removed.
pub fn keep_allowed(
    df: &DataFrame,
    column: &str,
    allowed: &[String],
) -> PolarsResult<(DataFrame, usize)> {
    let keep: Vec<bool> = string_values(df.column(column)?.as_materialized_series())?
        .iter()
        .map(|v| v.as_ref().is_some_and(|s| allowed.contains(s)))
        .collect();
    keep_rows(df, &keep)
}
