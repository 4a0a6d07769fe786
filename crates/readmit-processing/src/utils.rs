//! Shared helpers for the pipeline stages.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for processing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String or categorical text
    String,
    /// Columns with no values at all
    Null,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else if matches!(dtype, DataType::Null) {
        DtypeCategory::Null
    } else {
        DtypeCategory::Other
    }
}

/// Names of the numeric columns of `df`, in column order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Values of a numeric series as `f64`, keeping missing entries.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    Ok(series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

/// Values of a series rendered as text, keeping missing entries.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    Ok(series
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Most frequent non-missing value of a series, as text.
///
/// Ties go to the lexicographically smallest value so the result does not
/// depend on hash ordering.
pub fn string_mode(series: &Series) -> PolarsResult<Option<String>> {
    let mut value_counts: HashMap<String, usize> = HashMap::new();
    for val in string_values(series)?.into_iter().flatten() {
        *value_counts.entry(val).or_insert(0) += 1;
    }

    Ok(value_counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
        .map(|(val, _)| val))
}

/// Quantile of sorted, non-empty data by linear interpolation between the
/// closest ranks, using the `(n - 1) * q` position.
pub fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Median of the non-missing values, or `None` when there are none.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(f64::total_cmp);
    Some(quantile_linear(&observed, 0.5))
}

/// `part` as a percentage of `whole`; zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Estimated in-memory size of a frame, in megabytes.
pub fn memory_usage_mb(df: &DataFrame) -> f64 {
    df.estimated_size() as f64 / (1024.0 * 1024.0)
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let filled: Vec<f64> = numeric_values(series)?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let filled: Vec<String> = string_values(series)?
        .into_iter()
        .map(|v| v.unwrap_or_else(|| fill_value.to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

// =============================================================================
// Naming
// =============================================================================

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("Invalid regex: name separators"));

/// Export form of a column name: lowercase, with dashes and whitespace
/// replaced by underscores.
pub fn normalize_column_name(name: &str) -> String {
    SEPARATORS.replace_all(&name.to_lowercase(), "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::Null), DtypeCategory::Null);
    }

    #[test]
    fn test_string_mode_breaks_ties_deterministically() {
        let series = Series::new("s".into(), &[Some("b"), Some("a"), None, Some("b"), Some("a")]);
        assert_eq!(string_mode(&series).unwrap(), Some("a".to_string()));

        let series = Series::new("s".into(), &[Some("z"), Some("z"), Some("a")]);
        assert_eq!(string_mode(&series).unwrap(), Some("z".to_string()));

        let empty = Series::new("s".into(), &[None::<&str>, None]);
        assert_eq!(string_mode(&empty).unwrap(), None);
    }

    #[test]
    fn test_quantile_linear_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_linear(&data, 0.25), 1.75);
        assert_eq!(quantile_linear(&data, 0.5), 2.5);
        assert_eq!(quantile_linear(&data, 0.75), 3.25);
        assert_eq!(quantile_linear(&[7.0], 0.25), 7.0);
    }

    #[test]
    fn test_median_skips_missing() {
        assert_eq!(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_fill_string_nulls_keeps_plain_text() {
        let series = Series::new("s".into(), &[Some("A"), None]);
        let filled = fill_string_nulls(&series, "Unknown").unwrap();
        let values: Vec<Option<&str>> = filled.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("A"), Some("Unknown")]);
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("glyburide-metformin"), "glyburide_metformin");
        assert_eq!(normalize_column_name("A1Cresult_>8"), "a1cresult_>8");
        assert_eq!(normalize_column_name("Max Glu Serum"), "max_glu_serum");
    }
}
