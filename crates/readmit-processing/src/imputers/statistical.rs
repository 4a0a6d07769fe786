use crate::utils::{fill_numeric_nulls, fill_string_nulls, median, numeric_values, string_mode};
use polars::prelude::*;

/// Marker written into text columns that have no observed value at all.
pub const UNKNOWN_MARKER: &str = "Unknown";

/// Simple statistic-based fills.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill missing numbers with the column median.
    ///
    /// Returns `None` when the column has no observed values.
    pub fn median_fill(series: &Series) -> PolarsResult<Option<(Series, f64)>> {
        let values = numeric_values(series)?;
        match median(&values) {
            Some(fill) => Ok(Some((fill_numeric_nulls(series, fill)?, fill))),
            None => Ok(None),
        }
    }

    /// Fill missing text with the most frequent value.
    ///
    /// Returns `None` when the column has no observed values.
    pub fn mode_fill(series: &Series) -> PolarsResult<Option<(Series, String)>> {
        match string_mode(series)? {
            Some(mode) => Ok(Some((fill_string_nulls(series, &mode)?, mode))),
            None => Ok(None),
        }
    }

    /// Fill missing booleans with the majority value; ties fill `false`.
    ///
    /// Returns `None` when the column has no observed values.
    pub fn boolean_mode_fill(series: &Series) -> PolarsResult<Option<(Series, bool)>> {
        let values: Vec<Option<bool>> = series.bool()?.into_iter().collect();
        let trues = values.iter().filter(|v| **v == Some(true)).count();
        let falses = values.iter().filter(|v| **v == Some(false)).count();
        if trues + falses == 0 {
            return Ok(None);
        }

        let fill = trues > falses;
        let filled: Vec<bool> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
        Ok(Some((Series::new(series.name().clone(), filled), fill)))
    }

    /// Fill every missing entry with the unknown marker, as text.
    pub fn unknown_fill(series: &Series) -> PolarsResult<Series> {
        fill_string_nulls(series, UNKNOWN_MARKER)
    }

    /// Fill every missing number with a constant.
    pub fn constant_fill(series: &Series, value: f64) -> PolarsResult<Series> {
        fill_numeric_nulls(series, value)
    }
}
