//! Progress reporting for the readmission pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use readmit_processing::{CsvSource, Pipeline};
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&CsvSource::new("diabetic_data.csv"))?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the pipeline, in execution order, plus the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Loading,
    Exploration,
    Cleaning,
    TargetCreation,
    Imputation,
    OutlierHandling,
    FeatureEngineering,
    Encoding,
    FeatureScoring,
    Reporting,
    Complete,
    Failed,
}

impl PipelineStage {
    /// Short machine name, used in log fields and error context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Exploration => "exploration",
            Self::Cleaning => "cleaning",
            Self::TargetCreation => "target_creation",
            Self::Imputation => "imputation",
            Self::OutlierHandling => "outlier_handling",
            Self::FeatureEngineering => "feature_engineering",
            Self::Encoding => "encoding",
            Self::FeatureScoring => "feature_scoring",
            Self::Reporting => "reporting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Data",
            Self::Exploration => "Exploring Dataset",
            Self::Cleaning => "Cleaning Records",
            Self::TargetCreation => "Deriving Target",
            Self::Imputation => "Imputing Values",
            Self::OutlierHandling => "Capping Outliers",
            Self::FeatureEngineering => "Engineering Features",
            Self::Encoding => "Encoding Categoricals",
            Self::FeatureScoring => "Scoring Features",
            Self::Reporting => "Building Report",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage (0.0 - 1.0).
    ///
    /// Weights of the non-terminal stages sum to 1.0. Scoring dominates
    /// because it trains the forest.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.05,
            Self::Exploration => 0.05,
            Self::Cleaning => 0.10,
            Self::TargetCreation => 0.05,
            Self::Imputation => 0.15,
            Self::OutlierHandling => 0.10,
            Self::FeatureEngineering => 0.05,
            Self::Encoding => 0.10,
            Self::FeatureScoring => 0.30,
            Self::Reporting => 0.05,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Exploration => 0.05,
            Self::Cleaning => 0.10,
            Self::TargetCreation => 0.20,
            Self::Imputation => 0.25,
            Self::OutlierHandling => 0.40,
            Self::FeatureEngineering => 0.50,
            Self::Encoding => 0.55,
            Self::FeatureScoring => 0.65,
            Self::Reporting => 0.95,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress update emitted while the pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Optional sub-stage description (e.g., "Column: weight")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl ProgressUpdate {
    /// Creates a new progress update for a stage.
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
        }
    }

    /// Creates a progress update for one item out of `total` within a stage.
    pub fn with_items(
        stage: PipelineStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            ..Self::new(stage, stage_progress, message)
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Complete,
            sub_stage: None,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            sub_stage: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates while the pipeline runs.
///
/// Implementations must be `Send + Sync` so a pipeline can be driven from a
/// worker thread while updates are consumed elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Called at stage boundaries and, for per-column stages, once per column.
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RUN_STAGES: [PipelineStage; 10] = [
        PipelineStage::Loading,
        PipelineStage::Exploration,
        PipelineStage::Cleaning,
        PipelineStage::TargetCreation,
        PipelineStage::Imputation,
        PipelineStage::OutlierHandling,
        PipelineStage::FeatureEngineering,
        PipelineStage::Encoding,
        PipelineStage::FeatureScoring,
        PipelineStage::Reporting,
    ];

    #[test]
    fn test_weights_sum_to_one() {
        let total: f32 = RUN_STAGES.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        let mut expected = 0.0_f32;
        for stage in RUN_STAGES {
            assert!((stage.base_progress() - expected).abs() < 1e-4, "{stage}");
            expected += stage.weight();
        }
    }

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Imputation, 0.5, "halfway");
        assert_eq!(update.stage, PipelineStage::Imputation);
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.325).abs() < 1e-4);
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            PipelineStage::Imputation,
            "Column: weight",
            2,
            4,
            "Imputing weight",
        );
        assert_eq!(update.sub_stage.as_deref(), Some("Column: weight"));
        assert_eq!(update.stage_progress, 0.5);

        let empty = ProgressUpdate::with_items(PipelineStage::Encoding, "none", 0, 0, "");
        assert_eq!(empty.stage_progress, 0.0);
    }

    #[test]
    fn test_terminal_updates() {
        assert_eq!(ProgressUpdate::complete("done").progress, 1.0);
        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.stage, PipelineStage::Failed);
        assert_eq!(failed.message, "boom");
    }

    #[test]
    fn test_closure_reporter() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let reporter = ClosureProgressReporter::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Loading, 0.0, "start"));
        reporter.report(ProgressUpdate::complete("done"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&PipelineStage::OutlierHandling).unwrap();
        assert_eq!(json, "\"outlier_handling\"");
    }
}
