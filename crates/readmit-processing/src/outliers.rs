//! IQR-based outlier capping for numeric columns.

use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::pipeline::{PipelineStage, RunContext, Stage, StageOutput};
use crate::types::{ColumnOutliers, OutlierReport};
use crate::utils::{numeric_column_names, numeric_values, percentage, quantile_linear};
use polars::prelude::*;

/// Fences computed from the quartiles of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Bounds `[Q1 - m*IQR, Q3 + m*IQR]` over the non-missing values.
    pub fn from_values(values: &[Option<f64>], multiplier: f64) -> Option<Self> {
        let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
        if observed.is_empty() {
            return None;
        }
        observed.sort_by(f64::total_cmp);

        let q1 = quantile_linear(&observed, 0.25);
        let q3 = quantile_linear(&observed, 0.75);
        let iqr = q3 - q1;
        Some(Self {
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Clips numeric values to their IQR fences.
///
/// Identifier columns and the derived target are never touched.
#[derive(Debug, Clone)]
pub struct OutlierCapper {
    multiplier: f64,
    excluded: Vec<String>,
}

impl OutlierCapper {
    pub fn new(multiplier: f64, excluded: Vec<String>) -> Self {
        Self {
            multiplier,
            excluded,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let schema = &config.schema;
        let mut excluded: Vec<String> = schema
            .identifier_columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        excluded.push(schema.target_column.clone());
        Self::new(config.iqr_multiplier, excluded)
    }
}

impl Stage for OutlierCapper {
    type Report = OutlierReport;

    fn stage(&self) -> PipelineStage {
        PipelineStage::OutlierHandling
    }

    fn apply(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<StageOutput<OutlierReport>> {
        let mut data = df.clone();
        let mut report = OutlierReport {
            iqr_multiplier: self.multiplier,
            columns: Vec::new(),
        };

        let candidates: Vec<String> = numeric_column_names(df)
            .into_iter()
            .filter(|name| !self.excluded.contains(name))
            .collect();

        for name in candidates {
            let series = df.column(&name)?.as_materialized_series();
            let values = numeric_values(series).context(format!("Reading '{}'", name))?;
            let Some(bounds) = IqrBounds::from_values(&values, self.multiplier) else {
                continue;
            };

            let outliers_count = values
                .iter()
                .flatten()
                .filter(|v| !bounds.contains(**v))
                .count();

            let capped: Vec<Option<f64>> = values
                .iter()
                .map(|v| v.map(|val| val.clamp(bounds.lower, bounds.upper)))
                .collect();
            data.replace(&name, Series::new(name.as_str().into(), capped))
                .context(format!("Replacing '{}'", name))?;

            if outliers_count > 0 {
                ctx.debug(
                    PipelineStage::OutlierHandling,
                    format!(
                        "'{}': capped {} values to [{:.3}, {:.3}]",
                        name, outliers_count, bounds.lower, bounds.upper
                    ),
                );
            }

            report.columns.push(ColumnOutliers {
                outlier_percentage: percentage(outliers_count, df.height()),
                column: name,
                outliers_count,
                lower_bound: bounds.lower,
                upper_bound: bounds.upper,
            });
        }

        ctx.info(
            PipelineStage::OutlierHandling,
            format!(
                "Capped {} values across {} numeric columns",
                report.total_capped(),
                report.columns.len()
            ),
        );

        Ok(StageOutput::new(data, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn capper() -> OutlierCapper {
        OutlierCapper::from_config(&PipelineConfig::default())
    }

    #[test]
    fn test_bounds_use_interpolated_quartiles() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].iter().map(|v| Some(*v)).collect();
        let bounds = IqrBounds::from_values(&values, 1.5).unwrap();
        // Q1 = 1.75, Q3 = 3.25, IQR = 1.5
        assert_eq!(bounds.lower, -0.5);
        assert_eq!(bounds.upper, 5.5);
    }

    #[test]
    fn test_values_are_clipped_within_bounds() {
        let df = df!(
            "num_medications" => [10.0, 11.0, 12.0, 13.0, 14.0, 100.0, -50.0],
            "encounter_id" => [1, 2, 3, 4, 5, 6, 1_000_000],
            "readmitted_30_days" => [0, 0, 0, 0, 0, 0, 1]
        )
        .unwrap();
        let mut ctx = RunContext::detached();
        let output = capper().apply(&df, &mut ctx).unwrap();

        let column = &output.report.columns[0];
        assert_eq!(output.report.columns.len(), 1);
        assert_eq!(column.column, "num_medications");
        assert_eq!(column.outliers_count, 2);

        let capped = output.data.column("num_medications").unwrap();
        for value in capped.f64().unwrap().into_iter().flatten() {
            assert!(value >= column.lower_bound && value <= column.upper_bound);
        }

        // identifiers and the target are untouched
        let ids = output.data.column("encounter_id").unwrap();
        assert_eq!(ids.i32().unwrap().get(6), Some(1_000_000));
    }

    #[test]
    fn test_constant_column_is_unchanged() {
        let df = df!("number_emergency" => [0, 0, 0, 0]).unwrap();
        let mut ctx = RunContext::detached();
        let output = capper().apply(&df, &mut ctx).unwrap();

        assert_eq!(output.report.columns[0].outliers_count, 0);
        let values: Vec<Option<f64>> = output
            .data
            .column("number_emergency")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(0.0); 4]);
    }

    #[test]
    fn test_text_columns_are_ignored() {
        let df = df!("race" => ["Caucasian", "Other"]).unwrap();
        let mut ctx = RunContext::detached();
        let output = capper().apply(&df, &mut ctx).unwrap();
        assert!(output.report.columns.is_empty());
    }
}
