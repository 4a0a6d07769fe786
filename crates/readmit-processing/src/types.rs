use crate::config::ColumnRole;
use crate::error::{PipelineError, Result};
use crate::pipeline::RunLog;
use polars::prelude::DataFrame;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Stage reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub source: String,
    pub original_shape: (usize, usize),
    pub original_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnExploration {
    pub name: String,
    pub dtype: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
    /// Distinct non-missing values.
    pub unique_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ColumnRole>,
}

/// Read-only snapshot of the raw dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSnapshot {
    pub shape: (usize, usize),
    pub columns: Vec<ColumnExploration>,
    /// Present columns grouped by taxonomy role, plus `unclassified`.
    pub columns_by_role: BTreeMap<String, Vec<String>>,
    pub memory_usage_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_distribution: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub duplicates_removed: usize,
    pub sentinel_cells_normalized: usize,
    pub missing_patient_id_removed: usize,
    pub missing_weight_removed: usize,
    pub excluded_discharge_removed: usize,
    pub invalid_gender_removed: usize,
    pub duplicate_encounters_removed: usize,
    pub records_after_cleaning: usize,
    /// Human-readable description of each rule, in execution order.
    pub cleaning_steps: Vec<String>,
    /// Rules skipped because their column is absent.
    pub skipped_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target_column: String,
    /// Row count per label (0 and 1).
    pub target_distribution: BTreeMap<i32, usize>,
    /// Share of positive labels, in percent.
    pub readmission_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    Mode,
    UnknownMarker,
    Median,
    Knn,
    ZeroFill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnImputation {
    pub column: String,
    pub missing_before: usize,
    pub missing_after: usize,
    pub strategy: ImputationStrategy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImputationReport {
    pub missing_before: usize,
    pub missing_after: usize,
    pub strategies: Vec<ColumnImputation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutliers {
    pub column: String,
    pub outliers_count: usize,
    pub outlier_percentage: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub iqr_multiplier: f64,
    pub columns: Vec<ColumnOutliers>,
}

impl OutlierReport {
    pub fn total_capped(&self) -> usize {
        self.columns.iter().map(|c| c.outliers_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFeature {
    pub feature: String,
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureEngineeringReport {
    pub engineered_features: Vec<String>,
    pub skipped_features: Vec<SkippedFeature>,
    pub total_features_before: usize,
    pub total_features_after: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    OneHot,
    LabelEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEncoding {
    pub column: String,
    pub method: EncodingMethod,
    pub unique_values: usize,
    pub new_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EncodingReport {
    pub columns: Vec<ColumnEncoding>,
}

// ============================================================================
// Feature importance
// ============================================================================

/// One row of the feature importance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub rf_importance: f64,
    pub mutual_info_score: f64,
    pub rf_importance_norm: f64,
    pub mi_score_norm: f64,
    pub combined_score: f64,
}

/// Feature importance rows, sorted by `combined_score` descending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureImportanceTable {
    pub rows: Vec<FeatureImportance>,
}

impl FeatureImportanceTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn top(&self, n: usize) -> &[FeatureImportance] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureImportance> {
        self.rows.iter().find(|row| row.feature == feature)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceReport {
    pub top_10_features: Vec<FeatureImportance>,
    pub total_features_analyzed: usize,
}

// ============================================================================
// Final report sections
// ============================================================================

/// Data quality score in [0, 100] with its sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub completeness: f64,
    /// Absent when the dataset carries no target column.
    pub class_balance: Option<f64>,
    pub size_adequacy: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDatasetSummary {
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub memory_usage_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_distribution: Option<BTreeMap<i32, usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopFeature {
    pub feature: String,
    pub combined_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceSummary {
    pub top_5_features: Vec<TopFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub run_id: String,
    pub timestamp: String,
    pub total_processing_steps: usize,
    pub data_quality_score: QualityScore,
}

// ============================================================================
// Run report
// ============================================================================

/// A single entry of the run report. Each variant owns a fixed key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageRecord {
    Original(LoadReport),
    Exploration(ExplorationSnapshot),
    Cleaning(CleaningReport),
    TargetCreation(TargetReport),
    MissingValueHandling(ImputationReport),
    OutlierHandling(OutlierReport),
    FeatureEngineering(FeatureEngineeringReport),
    CategoricalEncoding(EncodingReport),
    FeatureImportance(ImportanceReport),
    FinalDataset(FinalDatasetSummary),
    FeatureImportanceSummary(FeatureImportanceSummary),
    ProcessingSummary(ProcessingSummary),
}

impl StageRecord {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Original(_) => "original",
            Self::Exploration(_) => "exploration",
            Self::Cleaning(_) => "cleaning",
            Self::TargetCreation(_) => "target_creation",
            Self::MissingValueHandling(_) => "missing_value_handling",
            Self::OutlierHandling(_) => "outlier_handling",
            Self::FeatureEngineering(_) => "feature_engineering",
            Self::CategoricalEncoding(_) => "categorical_encoding",
            Self::FeatureImportance(_) => "feature_importance",
            Self::FinalDataset(_) => "final_dataset",
            Self::FeatureImportanceSummary(_) => "feature_importance_summary",
            Self::ProcessingSummary(_) => "processing_summary",
        }
    }
}

macro_rules! impl_into_record {
    ($($report:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$report> for StageRecord {
                fn from(report: $report) -> Self {
                    StageRecord::$variant(report)
                }
            }
        )*
    };
}

impl_into_record! {
    LoadReport => Original,
    ExplorationSnapshot => Exploration,
    CleaningReport => Cleaning,
    TargetReport => TargetCreation,
    ImputationReport => MissingValueHandling,
    OutlierReport => OutlierHandling,
    FeatureEngineeringReport => FeatureEngineering,
    EncodingReport => CategoricalEncoding,
    ImportanceReport => FeatureImportance,
    FinalDatasetSummary => FinalDataset,
    FeatureImportanceSummary => FeatureImportanceSummary,
    ProcessingSummary => ProcessingSummary,
}

/// Append-only, ordered record of what each stage did.
///
/// A key can be recorded once per run; entries are never overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    entries: Vec<StageRecord>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, failing if its key is already present.
    pub fn record(&mut self, record: impl Into<StageRecord>) -> Result<()> {
        let record = record.into();
        let key = record.key();
        if self.contains(key) {
            return Err(PipelineError::state(
                key,
                "stage is already recorded for this run",
            ));
        }
        self.entries.push(record);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key() == key)
    }

    pub fn get(&self, key: &str) -> Option<&StageRecord> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(StageRecord::key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for RunReport {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.key(), entry)?;
        }
        map.end()
    }
}

// ============================================================================
// Pipeline result
// ============================================================================

/// Everything a completed run produces.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The final, model-ready dataset.
    pub dataset: DataFrame,
    pub report: RunReport,
    pub feature_importance: FeatureImportanceTable,
    pub quality: QualityScore,
    pub log: RunLog,
    pub run_id: String,
    pub duration_ms: u64,
}
