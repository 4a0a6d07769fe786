//! Binary readmission label derived from the raw three-valued outcome.

use crate::config::SchemaConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::pipeline::{PipelineStage, RunContext, Stage, StageOutput};
use crate::types::TargetReport;
use crate::utils::{DtypeCategory, get_dtype_category, percentage, string_values};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Adds the binary short-horizon readmission label.
///
/// A row is labelled 1 exactly when its outcome equals the short-horizon
/// value; any other value, including a missing one, is labelled 0.
#[derive(Debug, Clone)]
pub struct TargetDeriver {
    schema: SchemaConfig,
}

impl TargetDeriver {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    fn schema_error(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::schema(
            PipelineStage::TargetCreation.as_str(),
            &self.schema.outcome_column,
            reason,
        )
    }
}

impl Stage for TargetDeriver {
    type Report = TargetReport;

    fn stage(&self) -> PipelineStage {
        PipelineStage::TargetCreation
    }

    fn apply(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<StageOutput<TargetReport>> {
        let schema = &self.schema;
        let outcome = df
            .column(&schema.outcome_column)
            .map_err(|_| self.schema_error("column is absent"))?;

        if !matches!(
            get_dtype_category(outcome.dtype()),
            DtypeCategory::String | DtypeCategory::Null
        ) {
            return Err(self.schema_error(format!(
                "expected text outcome values, found {}",
                outcome.dtype()
            )));
        }

        let values = string_values(outcome.as_materialized_series())
            .context("Reading outcome values")?;
        if let Some(unexpected) = values
            .iter()
            .flatten()
            .find(|v| !schema.outcome_vocabulary.contains(v))
        {
            return Err(self.schema_error(format!(
                "unexpected value '{}' (expected one of {:?})",
                unexpected, schema.outcome_vocabulary
            )));
        }

        let labels: Vec<i32> = values
            .iter()
            .map(|v| i32::from(v.as_deref() == Some(schema.short_horizon_value.as_str())))
            .collect();
        let positives = labels.iter().filter(|l| **l == 1).count();
        let negatives = labels.len() - positives;

        let mut data = df.clone();
        data.with_column(Series::new(schema.target_column.as_str().into(), labels))
            .context("Adding target column")?;

        let report = TargetReport {
            target_column: schema.target_column.clone(),
            target_distribution: BTreeMap::from([(0, negatives), (1, positives)]),
            readmission_rate: percentage(positives, negatives + positives),
        };

        ctx.info(
            PipelineStage::TargetCreation,
            format!(
                "Derived '{}': {} positive of {} ({:.2}%)",
                schema.target_column,
                positives,
                negatives + positives,
                report.readmission_rate
            ),
        );

        Ok(StageOutput::new(data, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn derive(df: &DataFrame) -> Result<StageOutput<TargetReport>> {
        let mut ctx = RunContext::detached();
        TargetDeriver::new(SchemaConfig::default()).apply(df, &mut ctx)
    }

    #[test]
    fn test_label_is_one_only_for_short_horizon() {
        let df = df!("readmitted" => [Some("NO"), Some("<30"), Some(">30"), None, Some("<30")])
            .unwrap();
        let output = derive(&df).unwrap();

        let labels: Vec<Option<i32>> = output
            .data
            .column("readmitted_30_days")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(labels, vec![Some(0), Some(1), Some(0), Some(0), Some(1)]);
        assert_eq!(output.report.target_distribution, BTreeMap::from([(0, 3), (1, 2)]));
        assert_eq!(output.report.readmission_rate, 40.0);
        // raw outcome column is kept
        assert!(output.data.column("readmitted").is_ok());
    }

    #[test]
    fn test_missing_outcome_column_is_schema_error() {
        let df = df!("gender" => ["Male"]).unwrap();
        let err = derive(&df).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_unexpected_vocabulary_is_schema_error() {
        let df = df!("readmitted" => ["NO", "maybe"]).unwrap();
        let err = derive(&df).unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_numeric_outcome_is_schema_error() {
        let df = df!("readmitted" => [0, 1]).unwrap();
        assert!(derive(&df).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_no_positives_has_zero_rate() {
        let df = df!("readmitted" => ["NO", ">30"]).unwrap();
        let report = derive(&df).unwrap().report;
        assert_eq!(report.readmission_rate, 0.0);
        assert_eq!(report.target_distribution.get(&1), Some(&0));
    }
}
