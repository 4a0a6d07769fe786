//! Feature importance against the binary target.
//!
//! Two measures are computed per feature, each normalized by its maximum:
//! random forest impurity importance and mutual information. The combined
//! score is their mean.

mod forest;
mod mutual_info;

pub use forest::{RandomForest, TrainingSet};
pub use mutual_info::{MutualInfoEstimator, digamma};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::pipeline::{PipelineStage, ProgressUpdate, RunContext};
use crate::types::{FeatureImportance, FeatureImportanceTable, ImportanceReport};
use crate::utils::{numeric_column_names, numeric_values};
use polars::prelude::*;

/// Ranks the numeric features of the processed dataset.
#[derive(Debug, Clone)]
pub struct FeatureScorer {
    target_column: String,
    excluded: Vec<String>,
    forest: RandomForest,
    mutual_info: MutualInfoEstimator,
}

/// Divide every value by the maximum; all zeros when the maximum is not
/// positive.
pub fn normalize_by_max(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        values.iter().map(|v| v / max).collect()
    } else {
        vec![0.0; values.len()]
    }
}

impl FeatureScorer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let schema = &config.schema;
        let mut excluded: Vec<String> = schema
            .identifier_columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        excluded.push(schema.outcome_column.clone());
        excluded.push(schema.target_column.clone());

        Self {
            target_column: schema.target_column.clone(),
            excluded,
            forest: RandomForest::new(
                config.forest_trees,
                config.forest_max_depth,
                config.random_seed,
            ),
            mutual_info: MutualInfoEstimator::new(config.mi_neighbors, config.random_seed),
        }
    }

    /// Names of the columns that will be scored, in column order.
    pub fn feature_columns(&self, df: &DataFrame) -> Vec<String> {
        numeric_column_names(df)
            .into_iter()
            .filter(|name| !self.excluded.contains(name))
            .collect()
    }

    fn labels(&self, df: &DataFrame) -> Result<Vec<bool>> {
        let target = df.column(&self.target_column).map_err(|_| {
            PipelineError::schema(
                PipelineStage::FeatureScoring.as_str(),
                &self.target_column,
                "target column is absent",
            )
        })?;
        let values = numeric_values(target.as_materialized_series()).map_err(|e| {
            PipelineError::schema(
                PipelineStage::FeatureScoring.as_str(),
                &self.target_column,
                format!("target is not numeric: {}", e),
            )
        })?;
        Ok(values.into_iter().map(|v| v.unwrap_or(0.0) != 0.0).collect())
    }

    /// Score every numeric feature of `df`.
    ///
    /// Fails with a schema error when the target column is absent. Missing
    /// feature values count as 0.
    pub fn score(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<FeatureImportanceTable> {
        let labels = self.labels(df)?;
        let names = self.feature_columns(df);
        if names.is_empty() || df.height() == 0 {
            ctx.warn(PipelineStage::FeatureScoring, "No numeric features to score");
            return Ok(FeatureImportanceTable::default());
        }

        let mut features = Vec::with_capacity(names.len());
        let mut missing = 0;
        for name in &names {
            let series = df.column(name)?.as_materialized_series();
            let values = numeric_values(series).context(format!("Reading '{}'", name))?;
            missing += values.iter().filter(|v| v.is_none()).count();
            features.push(values.into_iter().map(|v| v.unwrap_or(0.0)).collect::<Vec<f64>>());
        }
        if missing > 0 {
            ctx.warn(
                PipelineStage::FeatureScoring,
                format!("{} missing feature values treated as 0", missing),
            );
        }

        ctx.progress(ProgressUpdate::new(
            PipelineStage::FeatureScoring,
            0.1,
            format!(
                "Training {} trees on {} features",
                self.forest.n_trees,
                names.len()
            ),
        ));
        let data = TrainingSet {
            features: &features,
            labels: &labels,
        };
        let rf = self.forest.feature_importances(&data);

        ctx.progress(ProgressUpdate::new(
            PipelineStage::FeatureScoring,
            0.7,
            "Estimating mutual information",
        ));
        let mi = self.mutual_info.estimate_all(&features, &labels);

        let rf_norm = normalize_by_max(&rf);
        let mi_norm = normalize_by_max(&mi);

        let mut rows: Vec<FeatureImportance> = names
            .into_iter()
            .enumerate()
            .map(|(i, feature)| FeatureImportance {
                feature,
                rf_importance: rf[i],
                mutual_info_score: mi[i],
                rf_importance_norm: rf_norm[i],
                mi_score_norm: mi_norm[i],
                combined_score: (rf_norm[i] + mi_norm[i]) / 2.0,
            })
            .collect();
        rows.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));

        if let Some(top) = rows.first() {
            ctx.info(
                PipelineStage::FeatureScoring,
                format!(
                    "Scored {} features; top '{}' ({:.3})",
                    rows.len(),
                    top.feature,
                    top.combined_score
                ),
            );
        }

        Ok(FeatureImportanceTable { rows })
    }
}

impl ImportanceReport {
    pub fn from_table(table: &FeatureImportanceTable) -> Self {
        Self {
            top_10_features: table.top(10).to_vec(),
            total_features_analyzed: table.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scorer() -> FeatureScorer {
        let config = PipelineConfig::builder().forest_trees(10).build().unwrap();
        FeatureScorer::from_config(&config)
    }

    fn encounters() -> DataFrame {
        let n = 120;
        let target: Vec<i32> = (0..n).map(|i| i32::from(i % 4 == 0)).collect();
        let stay: Vec<f64> = target
            .iter()
            .enumerate()
            .map(|(i, t)| f64::from(*t) * 8.0 + (i % 5) as f64)
            .collect();
        let noise: Vec<f64> = (0..n).map(|i| ((i * 13) % 7) as f64).collect();
        let encounter_id: Vec<i64> = (0..n as i64).collect();
        df!(
            "encounter_id" => encounter_id,
            "noise" => noise,
            "time_in_hospital" => stay,
            "race" => vec!["Caucasian"; n],
            "readmitted_30_days" => target
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_by_max() {
        assert_eq!(normalize_by_max(&[1.0, 4.0, 2.0]), vec![0.25, 1.0, 0.5]);
        assert_eq!(normalize_by_max(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(normalize_by_max(&[]), Vec::<f64>::new());
    }

    #[test]
    fn test_scores_numeric_features_only() {
        let mut ctx = RunContext::detached();
        let table = scorer().score(&encounters(), &mut ctx).unwrap();

        let features: Vec<&str> = table.rows.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(features, vec!["time_in_hospital", "noise"]);

        for row in &table.rows {
            assert!((0.0..=1.0).contains(&row.combined_score));
        }
        let strongest = table
            .rows
            .iter()
            .max_by(|a, b| a.rf_importance.total_cmp(&b.rf_importance))
            .unwrap();
        assert_eq!(strongest.rf_importance_norm, 1.0);
    }

    #[test]
    fn test_missing_target_is_a_schema_error() {
        let df = df!("noise" => [1.0, 2.0]).unwrap();
        let mut ctx = RunContext::detached();
        let err = scorer().score(&df, &mut ctx).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_report_keeps_top_ten() {
        let rows = (0..12)
            .map(|i| FeatureImportance {
                feature: format!("f{}", i),
                rf_importance: 0.0,
                mutual_info_score: 0.0,
                rf_importance_norm: 0.0,
                mi_score_norm: 0.0,
                combined_score: 0.0,
            })
            .collect();
        let report = ImportanceReport::from_table(&FeatureImportanceTable { rows });
        assert_eq!(report.top_10_features.len(), 10);
        assert_eq!(report.total_features_analyzed, 12);
    }
}
