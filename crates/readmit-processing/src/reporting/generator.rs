use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::io::{ExportFormat, TabularSink};
use crate::types::{
    FeatureImportanceSummary, FeatureImportanceTable, FinalDatasetSummary, PipelineResult,
    ProcessingSummary, QualityScore, RunReport, StageRecord, TopFeature,
};
use crate::utils::{memory_usage_mb, numeric_values};
use chrono::Local;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Timestamp format shared by the processing summary and artifact names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Files written for one run.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPaths {
    pub datasets: BTreeMap<ExportFormat, PathBuf>,
    pub feature_importance: PathBuf,
    pub validation_report: PathBuf,
}

/// Builds the closing report sections and writes run artifacts.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    target_column: String,
}

impl ReportGenerator {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.schema.target_column.clone())
    }

    /// Shape, columns, memory and target distribution of the final dataset.
    pub fn final_dataset(&self, df: &DataFrame) -> FinalDatasetSummary {
        let target_distribution = df
            .column(&self.target_column)
            .ok()
            .and_then(|c| numeric_values(c.as_materialized_series()).ok())
            .map(|values| {
                let mut counts = BTreeMap::new();
                for value in values.into_iter().flatten() {
                    *counts.entry(value as i32).or_insert(0) += 1;
                }
                counts
            });

        FinalDatasetSummary {
            shape: df.shape(),
            columns: df
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            memory_usage_mb: memory_usage_mb(df),
            target_distribution,
        }
    }

    /// The five highest-ranked features.
    pub fn importance_summary(table: &FeatureImportanceTable) -> FeatureImportanceSummary {
        FeatureImportanceSummary {
            top_5_features: table
                .top(5)
                .iter()
                .map(|row| TopFeature {
                    feature: row.feature.clone(),
                    combined_score: row.combined_score,
                })
                .collect(),
        }
    }

    /// Closing summary. Counts every report entry recorded so far.
    pub fn processing_summary(
        run_id: &str,
        report: &RunReport,
        quality: QualityScore,
    ) -> ProcessingSummary {
        ProcessingSummary {
            run_id: run_id.to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            total_processing_steps: report.len(),
            data_quality_score: quality,
        }
    }

    fn run_timestamp(report: &RunReport) -> String {
        match report.get("processing_summary") {
            Some(StageRecord::ProcessingSummary(summary)) => summary.timestamp.clone(),
            _ => Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Write the processed dataset in each format, the feature importance
    /// table as CSV and the run report as JSON.
    pub fn write_artifacts(
        sink: &dyn TabularSink,
        result: &PipelineResult,
        formats: &[ExportFormat],
    ) -> Result<ArtifactPaths> {
        let timestamp = Self::run_timestamp(&result.report);

        let mut datasets = BTreeMap::new();
        for format in formats {
            let path = sink.write_table(
                &format!("encounters_processed_{}", timestamp),
                &result.dataset,
                *format,
            )?;
            datasets.insert(*format, path);
        }

        let importance = importance_frame(&result.feature_importance)
            .context("Building feature importance table")?;
        let feature_importance = sink.write_table(
            &format!("feature_importance_{}", timestamp),
            &importance,
            ExportFormat::Csv,
        )?;

        let validation_report = sink.write_json(
            &format!("validation_report_{}", timestamp),
            &serde_json::to_value(&result.report)?,
        )?;

        info!(
            "Wrote {} dataset files, feature importance and validation report",
            datasets.len()
        );
        Ok(ArtifactPaths {
            datasets,
            feature_importance,
            validation_report,
        })
    }
}

/// Feature importance table as a frame, one row per feature.
pub fn importance_frame(table: &FeatureImportanceTable) -> PolarsResult<DataFrame> {
    let rows = &table.rows;
    df!(
        "feature" => rows.iter().map(|r| r.feature.clone()).collect::<Vec<_>>(),
        "rf_importance" => rows.iter().map(|r| r.rf_importance).collect::<Vec<_>>(),
        "mutual_info_score" => rows.iter().map(|r| r.mutual_info_score).collect::<Vec<_>>(),
        "rf_importance_norm" => rows.iter().map(|r| r.rf_importance_norm).collect::<Vec<_>>(),
        "mi_score_norm" => rows.iter().map(|r| r.mi_score_norm).collect::<Vec<_>>(),
        "combined_score" => rows.iter().map(|r| r.combined_score).collect::<Vec<_>>()
    )
}
