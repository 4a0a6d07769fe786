//! Configuration types for the readmission pipeline.
//!
//! [`PipelineConfig`] carries the runtime parameters of every stage, and
//! [`SchemaConfig`] carries the domain column names and vocabularies the
//! stages look up. Both deserialize from partial JSON, falling back to the
//! defaults for anything left out.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Column taxonomy
// ============================================================================

/// Role a source column plays in the encounter schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Demographic,
    Clinical,
    Medication,
    Administrative,
    Diagnostic,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demographic => "demographic",
            Self::Clinical => "clinical",
            Self::Medication => "medication",
            Self::Administrative => "administrative",
            Self::Diagnostic => "diagnostic",
        }
    }
}

/// Grouping of known columns by role.
///
/// Used for grouping in exploration output. Columns missing from a dataset
/// are simply not reported; columns the taxonomy does not know are grouped
/// as unclassified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnTaxonomy {
    pub roles: BTreeMap<ColumnRole, Vec<String>>,
}

impl ColumnTaxonomy {
    /// Role of `column`, if the taxonomy lists it.
    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        self.roles
            .iter()
            .find(|(_, columns)| columns.iter().any(|c| c == column))
            .map(|(role, _)| *role)
    }

    /// Columns listed under `role`, in declaration order.
    pub fn columns(&self, role: ColumnRole) -> &[String] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for ColumnTaxonomy {
    fn default() -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(
            ColumnRole::Demographic,
            strings(&["age", "gender", "race", "weight"]),
        );
        roles.insert(
            ColumnRole::Diagnostic,
            strings(&["diag_1", "diag_2", "diag_3", "medical_specialty"]),
        );
        roles.insert(ColumnRole::Medication, strings(&MEDICATION_COLUMNS));
        roles.insert(
            ColumnRole::Administrative,
            strings(&[
                "admission_type_id",
                "discharge_disposition_id",
                "admission_source_id",
                "payer_code",
            ]),
        );
        roles.insert(
            ColumnRole::Clinical,
            strings(&[
                "time_in_hospital",
                "num_lab_procedures",
                "num_procedures",
                "num_medications",
                "number_outpatient",
                "number_emergency",
                "number_inpatient",
                "number_diagnoses",
                "max_glu_serum",
                "A1Cresult",
                "change",
                "diabetesMed",
            ]),
        );
        Self { roles }
    }
}

/// The 23 medication columns of the encounter schema.
pub const MEDICATION_COLUMNS: [&str; 23] = [
    "metformin",
    "repaglinide",
    "nateglinide",
    "chlorpropamide",
    "glimepiride",
    "acetohexamide",
    "glipizide",
    "glyburide",
    "tolbutamide",
    "pioglitazone",
    "rosiglitazone",
    "acarbose",
    "miglitol",
    "troglitazone",
    "tolazamide",
    "examide",
    "citoglipton",
    "insulin",
    "glyburide-metformin",
    "glipizide-metformin",
    "glimepiride-pioglitazone",
    "metformin-rosiglitazone",
    "metformin-pioglitazone",
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ============================================================================
// Schema configuration
// ============================================================================

/// Column names and vocabularies of the encounter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Marker used in the raw data for "unknown". Default: `?`
    pub missing_sentinel: String,
    /// Patient identifier. Default: `patient_nbr`
    pub patient_id_column: String,
    /// Encounter identifier. Default: `encounter_id`
    pub encounter_id_column: String,
    pub weight_column: String,
    pub discharge_column: String,
    /// Discharge codes (death and hospice) removed during cleaning.
    pub excluded_discharge_codes: Vec<i64>,
    pub gender_column: String,
    pub allowed_genders: Vec<String>,
    /// Raw three-valued readmission outcome. Default: `readmitted`
    pub outcome_column: String,
    /// Every value the outcome column may hold. Default: `NO`, `<30`, `>30`
    pub outcome_vocabulary: Vec<String>,
    /// Outcome value that marks a positive label. Default: `<30`
    pub short_horizon_value: String,
    /// Name of the derived binary label. Default: `readmitted_30_days`
    pub target_column: String,
    pub features: FeatureColumns,
    pub taxonomy: ColumnTaxonomy,
}

impl SchemaConfig {
    /// Columns that never serve as model features or outlier candidates.
    pub fn identifier_columns(&self) -> [&str; 2] {
        [
            self.patient_id_column.as_str(),
            self.encounter_id_column.as_str(),
        ]
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            missing_sentinel: "?".to_string(),
            patient_id_column: "patient_nbr".to_string(),
            encounter_id_column: "encounter_id".to_string(),
            weight_column: "weight".to_string(),
            discharge_column: "discharge_disposition_id".to_string(),
            excluded_discharge_codes: vec![11, 13, 14, 19, 20, 21],
            gender_column: "gender".to_string(),
            allowed_genders: strings(&["Male", "Female"]),
            outcome_column: "readmitted".to_string(),
            outcome_vocabulary: strings(&["NO", "<30", ">30"]),
            short_horizon_value: "<30".to_string(),
            target_column: "readmitted_30_days".to_string(),
            features: FeatureColumns::default(),
            taxonomy: ColumnTaxonomy::default(),
        }
    }
}

/// Source columns and constants used by feature engineering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureColumns {
    /// Column holding `[a-b)` age brackets.
    pub age_column: String,
    /// Upper edges of the age groups; the first entry is the lower edge.
    pub age_bins: Vec<f64>,
    pub age_labels: Vec<String>,
    /// Values of a medication column meaning "no change".
    pub unchanged_medication_values: Vec<String>,
    pub diagnosis_columns: Vec<String>,
    /// Prior outpatient, emergency and inpatient visit counts.
    pub utilization_columns: Vec<String>,
    pub stay_length_column: String,
    pub procedure_count_column: String,
    pub lab_procedure_column: String,
    pub change_column: String,
    pub change_positive_value: String,
    pub diabetes_med_column: String,
    pub diabetes_med_positive_value: String,
}

impl Default for FeatureColumns {
    fn default() -> Self {
        Self {
            age_column: "age".to_string(),
            age_bins: vec![0.0, 30.0, 50.0, 70.0, 100.0],
            age_labels: strings(&["Young", "Middle", "Senior", "Elderly"]),
            unchanged_medication_values: strings(&["No", "Steady"]),
            diagnosis_columns: strings(&["diag_1", "diag_2", "diag_3"]),
            utilization_columns: strings(&[
                "number_outpatient",
                "number_emergency",
                "number_inpatient",
            ]),
            stay_length_column: "time_in_hospital".to_string(),
            procedure_count_column: "num_procedures".to_string(),
            lab_procedure_column: "num_lab_procedures".to_string(),
            change_column: "change".to_string(),
            change_positive_value: "Ch".to_string(),
            diabetes_med_column: "diabetesMed".to_string(),
            diabetes_med_positive_value: "Yes".to_string(),
        }
    }
}

// ============================================================================
// Pipeline configuration
// ============================================================================

/// Runtime parameters of the pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a configuration with the
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use readmit_processing::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .knn_neighbors(7)
///     .cardinality_cutoff(12)
///     .enable_outlier_capping(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Neighbors used by single-column KNN imputation. Default: 5
    pub knn_neighbors: usize,

    /// Numeric columns with a missing share below this use the median,
    /// others use KNN imputation. Default: 0.20
    pub missing_share_cutoff: f64,

    /// Categorical columns with at most this many distinct values are
    /// one-hot encoded, others are label encoded. Default: 10
    pub cardinality_cutoff: usize,

    /// Width of the IQR fences. Default: 1.5
    pub iqr_multiplier: f64,

    /// Row count considered fully adequate by the quality score. Default: 50000
    pub target_rows: usize,

    /// Whether the outlier capping stage runs. Default: true
    pub enable_outlier_capping: bool,

    /// Trees in the importance forest. Default: 100
    pub forest_trees: usize,

    /// Depth limit for forest trees; `None` grows them fully. Default: None
    pub forest_max_depth: Option<usize>,

    /// Neighbors used by the mutual information estimator. Default: 3
    pub mi_neighbors: usize,

    /// Seed for every randomized step. Default: 42
    pub random_seed: u64,

    pub schema: SchemaConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            knn_neighbors: 5,
            missing_share_cutoff: 0.20,
            cardinality_cutoff: 10,
            iqr_multiplier: 1.5,
            target_rows: 50_000,
            enable_outlier_capping: true,
            forest_trees: 100,
            forest_max_depth: None,
            mi_neighbors: 3,
            random_seed: 42,
            schema: SchemaConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&contents)?;
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.missing_share_cutoff) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "missing_share_cutoff".to_string(),
                value: self.missing_share_cutoff,
            });
        }

        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        for (field, value) in [
            ("knn_neighbors", self.knn_neighbors),
            ("cardinality_cutoff", self.cardinality_cutoff),
            ("target_rows", self.target_rows),
            ("forest_trees", self.forest_trees),
            ("mi_neighbors", self.mi_neighbors),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::MustBePositive {
                    field: field.to_string(),
                });
            }
        }

        if self.forest_max_depth == Some(0) {
            return Err(ConfigValidationError::MustBePositive {
                field: "forest_max_depth".to_string(),
            });
        }

        let features = &self.schema.features;
        let bins_sorted = features.age_bins.windows(2).all(|w| w[0] < w[1]);
        if !bins_sorted || features.age_bins.len() != features.age_labels.len() + 1 {
            return Err(ConfigValidationError::InvalidAgeBins {
                bins: features.age_bins.len(),
                labels: features.age_labels.len(),
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid IQR multiplier: {0} (must be a positive finite number)")]
    InvalidMultiplier(f64),

    #[error("'{field}' must be at least 1")]
    MustBePositive { field: String },

    #[error("Age bins must be increasing and number one more than the labels ({bins} bins, {labels} labels)")]
    InvalidAgeBins { bins: usize, labels: usize },
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    knn_neighbors: Option<usize>,
    missing_share_cutoff: Option<f64>,
    cardinality_cutoff: Option<usize>,
    iqr_multiplier: Option<f64>,
    target_rows: Option<usize>,
    enable_outlier_capping: Option<bool>,
    forest_trees: Option<usize>,
    forest_max_depth: Option<usize>,
    mi_neighbors: Option<usize>,
    random_seed: Option<u64>,
    schema: Option<SchemaConfig>,
}

impl PipelineConfigBuilder {
    pub fn knn_neighbors(mut self, n: usize) -> Self {
        self.knn_neighbors = Some(n);
        self
    }

    pub fn missing_share_cutoff(mut self, cutoff: f64) -> Self {
        self.missing_share_cutoff = Some(cutoff);
        self
    }

    pub fn cardinality_cutoff(mut self, cutoff: usize) -> Self {
        self.cardinality_cutoff = Some(cutoff);
        self
    }

    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    pub fn target_rows(mut self, rows: usize) -> Self {
        self.target_rows = Some(rows);
        self
    }

    pub fn enable_outlier_capping(mut self, enable: bool) -> Self {
        self.enable_outlier_capping = Some(enable);
        self
    }

    pub fn forest_trees(mut self, trees: usize) -> Self {
        self.forest_trees = Some(trees);
        self
    }

    pub fn forest_max_depth(mut self, depth: usize) -> Self {
        self.forest_max_depth = Some(depth);
        self
    }

    pub fn mi_neighbors(mut self, n: usize) -> Self {
        self.mi_neighbors = Some(n);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Build the configuration, validating all values.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            knn_neighbors: self.knn_neighbors.unwrap_or(defaults.knn_neighbors),
            missing_share_cutoff: self
                .missing_share_cutoff
                .unwrap_or(defaults.missing_share_cutoff),
            cardinality_cutoff: self.cardinality_cutoff.unwrap_or(defaults.cardinality_cutoff),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            target_rows: self.target_rows.unwrap_or(defaults.target_rows),
            enable_outlier_capping: self
                .enable_outlier_capping
                .unwrap_or(defaults.enable_outlier_capping),
            forest_trees: self.forest_trees.unwrap_or(defaults.forest_trees),
            forest_max_depth: self.forest_max_depth.or(defaults.forest_max_depth),
            mi_neighbors: self.mi_neighbors.unwrap_or(defaults.mi_neighbors),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            schema: self.schema.unwrap_or(defaults.schema),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.knn_neighbors, 5);
        assert_eq!(config.missing_share_cutoff, 0.20);
        assert_eq!(config.cardinality_cutoff, 10);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.target_rows, 50_000);
        assert!(config.enable_outlier_capping);
        assert_eq!(config.schema.excluded_discharge_codes, vec![11, 13, 14, 19, 20, 21]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::builder()
            .knn_neighbors(3)
            .cardinality_cutoff(4)
            .enable_outlier_capping(false)
            .forest_max_depth(6)
            .build()
            .unwrap();

        assert_eq!(config.knn_neighbors, 3);
        assert_eq!(config.cardinality_cutoff, 4);
        assert!(!config.enable_outlier_capping);
        assert_eq!(config.forest_max_depth, Some(6));
        assert_eq!(config.forest_trees, 100);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let result = PipelineConfig::builder().missing_share_cutoff(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));

        let result = PipelineConfig::builder().knn_neighbors(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MustBePositive { .. }
        ));

        let result = PipelineConfig::builder().iqr_multiplier(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidMultiplier(_)
        ));
    }

    #[test]
    fn test_validation_rejects_mismatched_age_bins() {
        let mut schema = SchemaConfig::default();
        schema.features.age_labels.pop();
        let result = PipelineConfig::builder().schema(schema).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidAgeBins { .. }
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"knn_neighbors": 9, "schema": {"missing_sentinel": "NA"}}"#)
                .unwrap();
        assert_eq!(config.knn_neighbors, 9);
        assert_eq!(config.schema.missing_sentinel, "NA");
        assert_eq!(config.schema.outcome_column, "readmitted");
        assert_eq!(config.cardinality_cutoff, 10);
    }

    #[test]
    fn test_taxonomy_lookup() {
        let taxonomy = ColumnTaxonomy::default();
        assert_eq!(taxonomy.role_of("insulin"), Some(ColumnRole::Medication));
        assert_eq!(taxonomy.role_of("payer_code"), Some(ColumnRole::Administrative));
        assert_eq!(taxonomy.role_of("not_a_column"), None);
        assert_eq!(taxonomy.columns(ColumnRole::Medication).len(), 23);
    }
}
