//! Categorical encoding.
//!
//! Low-cardinality columns become 0/1 indicator columns with the first
//! sorted category as the reference. High-cardinality columns get integer
//! codes assigned in sorted order of their distinct values.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::imputers::UNKNOWN_MARKER;
use crate::pipeline::{PipelineStage, RunContext, Stage, StageOutput};
use crate::types::{ColumnEncoding, EncodingMethod, EncodingReport};
use crate::utils::{DtypeCategory, get_dtype_category, string_values};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Replaces every text-like column with a numeric encoding.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    cardinality_cutoff: usize,
    excluded: Vec<String>,
}

/// Indicator column name for one category.
pub fn indicator_name(column: &str, category: &str) -> String {
    format!("{}_{}", column, category)
}

/// Name of the integer-coded column.
pub fn encoded_name(column: &str) -> String {
    format!("{}_encoded", column)
}

impl CategoricalEncoder {
    pub fn new(cardinality_cutoff: usize, excluded: Vec<String>) -> Self {
        Self {
            cardinality_cutoff,
            excluded,
        }
    }

    /// The raw outcome column is kept as-is for reference.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.cardinality_cutoff,
            vec![config.schema.outcome_column.clone()],
        )
    }

    fn is_candidate(&self, column: &Column) -> bool {
        !self.excluded.iter().any(|e| e == column.name().as_str())
            && matches!(
                get_dtype_category(column.dtype()),
                DtypeCategory::String | DtypeCategory::Boolean
            )
    }

    fn one_hot(name: &str, values: &[Option<String>], categories: &[String]) -> Vec<Series> {
        categories
            .iter()
            .skip(1)
            .map(|category| {
                let flags: Vec<i32> = values
                    .iter()
                    .map(|v| i32::from(v.as_ref() == Some(category)))
                    .collect();
                Series::new(indicator_name(name, category).into(), flags)
            })
            .collect()
    }

    fn label_encode(name: &str, values: &[Option<String>]) -> Series {
        let filled: Vec<&str> = values
            .iter()
            .map(|v| v.as_deref().unwrap_or(UNKNOWN_MARKER))
            .collect();
        let codes: BTreeMap<&str, i64> = filled
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .zip(0..)
            .collect();
        let encoded: Vec<i64> = filled.iter().map(|v| codes[v]).collect();
        Series::new(encoded_name(name).into(), encoded)
    }
}

impl Stage for CategoricalEncoder {
    type Report = EncodingReport;

    fn stage(&self) -> PipelineStage {
        PipelineStage::Encoding
    }

    fn apply(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<StageOutput<EncodingReport>> {
        let candidates: Vec<&Column> = df
            .get_columns()
            .iter()
            .filter(|c| self.is_candidate(c))
            .collect();

        let mut data = df.clone();
        let mut report = EncodingReport::default();

        for column in candidates {
            let name = column.name().to_string();
            let values = string_values(column.as_materialized_series())
                .context(format!("Reading '{}'", name))?;
            let categories: Vec<String> = values
                .iter()
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let (method, new_series) = if categories.len() <= self.cardinality_cutoff {
                (
                    EncodingMethod::OneHot,
                    Self::one_hot(&name, &values, &categories),
                )
            } else {
                (
                    EncodingMethod::LabelEncoding,
                    vec![Self::label_encode(&name, &values)],
                )
            };

            data = data.drop(&name).context(format!("Dropping '{}'", name))?;

            let mut new_columns = Vec::with_capacity(new_series.len());
            for series in new_series {
                let new_name = series.name().to_string();
                if data.column(&new_name).is_ok() {
                    return Err(PipelineError::schema(
                        PipelineStage::Encoding.as_str(),
                        &new_name,
                        format!("encoding '{}' would overwrite an existing column", name),
                    ));
                }
                data.with_column(series)
                    .context(format!("Adding '{}'", new_name))?;
                new_columns.push(new_name);
            }

            ctx.debug(
                PipelineStage::Encoding,
                format!(
                    "'{}': {} categories, {:?} -> {} columns",
                    name,
                    categories.len(),
                    method,
                    new_columns.len()
                ),
            );

            report.columns.push(ColumnEncoding {
                column: name,
                method,
                unique_values: categories.len(),
                new_columns,
            });
        }

        let one_hot = report
            .columns
            .iter()
            .filter(|c| c.method == EncodingMethod::OneHot)
            .count();
        ctx.info(
            PipelineStage::Encoding,
            format!(
                "Encoded {} columns ({} one-hot, {} label-encoded)",
                report.columns.len(),
                one_hot,
                report.columns.len() - one_hot
            ),
        );

        Ok(StageOutput::new(data, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(df: &DataFrame, name: &str) -> Vec<i32> {
        df.column(name)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_low_cardinality_produces_k_minus_one_indicators() {
        let df = df!(
            "race" => [Some("Caucasian"), Some("Asian"), None, Some("Other"), Some("Asian")],
            "num_medications" => [1, 2, 3, 4, 5]
        )
        .unwrap();
        let mut ctx = RunContext::detached();
        let output = CategoricalEncoder::new(10, vec![])
            .apply(&df, &mut ctx)
            .unwrap();

        let encoding = &output.report.columns[0];
        assert_eq!(encoding.method, EncodingMethod::OneHot);
        assert_eq!(encoding.unique_values, 3);
        // "Asian" is the reference category
        assert_eq!(encoding.new_columns, vec!["race_Caucasian", "race_Other"]);

        assert!(output.data.column("race").is_err());
        assert_eq!(ints(&output.data, "race_Caucasian"), vec![1, 0, 0, 0, 0]);
        assert_eq!(ints(&output.data, "race_Other"), vec![0, 0, 0, 1, 0]);
        assert_eq!(output.data.width(), 3);
    }

    #[test]
    fn test_high_cardinality_codes_are_a_bijection() {
        let df = df!(
            "medical_specialty" => [
                Some("Surgery"), Some("Cardiology"), None, Some("Surgery"), Some("Orthopedics")
            ]
        )
        .unwrap();
        let mut ctx = RunContext::detached();
        let output = CategoricalEncoder::new(2, vec![])
            .apply(&df, &mut ctx)
            .unwrap();

        let encoding = &output.report.columns[0];
        assert_eq!(encoding.method, EncodingMethod::LabelEncoding);
        assert_eq!(encoding.new_columns, vec!["medical_specialty_encoded"]);

        let codes: Vec<i64> = output
            .data
            .column("medical_specialty_encoded")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        // Cardiology, Orthopedics, Surgery, Unknown
        assert_eq!(codes, vec![2, 0, 3, 2, 1]);
        let distinct: BTreeSet<i64> = codes.into_iter().collect();
        assert_eq!(distinct, (0..4).collect());
    }

    #[test]
    fn test_outcome_and_numeric_columns_are_kept() {
        let config = PipelineConfig::default();
        let df = df!(
            "readmitted" => ["NO", "<30", ">30"],
            "readmitted_30_days" => [0, 1, 0],
            "change" => ["Ch", "No", "Ch"]
        )
        .unwrap();
        let mut ctx = RunContext::detached();
        let output = CategoricalEncoder::from_config(&config)
            .apply(&df, &mut ctx)
            .unwrap();

        assert!(output.data.column("readmitted").is_ok());
        assert!(output.data.column("readmitted_30_days").is_ok());
        assert_eq!(ints(&output.data, "change_No"), vec![0, 1, 0]);
        assert_eq!(output.report.columns.len(), 1);
    }

    #[test]
    fn test_boolean_columns_are_encoded() {
        let df = df!("flag" => [true, false, true]).unwrap();
        let mut ctx = RunContext::detached();
        let output = CategoricalEncoder::new(10, vec![])
            .apply(&df, &mut ctx)
            .unwrap();
        assert_eq!(ints(&output.data, "flag_true"), vec![1, 0, 1]);
    }
}
