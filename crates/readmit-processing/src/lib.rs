//! Readmission Dataset Pipeline Library
//!
//! Turns raw diabetes patient-encounter records into an ML-ready dataset
//! for predicting 30-day hospital readmission, built with Rust and Polars.
//!
//! # Overview
//!
//! A single run moves one dataset through a fixed sequence of stages:
//!
//! - **Exploration**: shape, missing values and per-column summaries of the raw data
//! - **Cleaning**: duplicates, `?` sentinels, unknown weights, excluded discharges, invalid genders
//! - **Target Creation**: the binary `readmitted_30_days` label
//! - **Imputation**: median or KNN for numeric columns, mode or `Unknown` for categorical ones
//! - **Outlier Capping**: IQR fences, clipping instead of dropping
//! - **Feature Engineering**: age, utilization, medication and stay features
//! - **Encoding**: one-hot or label encoding chosen by cardinality
//! - **Feature Scoring**: random forest importance combined with mutual information
//! - **Reporting**: final dataset summary and a 0-100 data quality score
//!
//! Every stage appends one entry to the run report and logs through a
//! per-run [`RunContext`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use readmit_processing::{CsvSource, DatasetExporter, Pipeline, ReportGenerator, ExportFormat};
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&CsvSource::new("diabetic_data.csv"))?;
//!
//! println!("Final shape: {:?}", result.dataset.shape());
//! println!("Quality score: {:.1}", result.quality.overall);
//!
//! let exporter = DatasetExporter::new("processed_data");
//! ReportGenerator::write_artifacts(&exporter, &result, &[ExportFormat::Csv])?;
//! ```
//!
//! # Configuration
//!
//! Use [`PipelineConfig`] to customize the stages:
//!
//! ```rust,ignore
//! use readmit_processing::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .knn_neighbors(7)
//!     .missing_share_cutoff(0.3)
//!     .cardinality_cutoff(12)
//!     .enable_outlier_capping(false)
//!     .random_seed(7)
//!     .build()?;
//! ```
//!
//! # Driving stages by hand
//!
//! [`DatasetContainer`] runs stages one at a time and refuses out-of-order
//! calls with a state error:
//!
//! ```rust,ignore
//! use readmit_processing::{DatasetContainer, FrameSource, RunContext, SchemaConfig};
//! use readmit_processing::cleaner::EncounterCleaner;
//! use readmit_processing::target::TargetDeriver;
//!
//! let mut ctx = RunContext::detached();
//! let mut container = DatasetContainer::new();
//! container.load(&FrameSource::new("memory", df), &mut ctx)?;
//! container.clean(&EncounterCleaner::new(SchemaConfig::default()), &mut ctx)?;
//! container.apply(&TargetDeriver::new(SchemaConfig::default()), &mut ctx)?;
//! ```

pub mod cleaner;
pub mod config;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod explorer;
pub mod features;
pub mod importance;
pub mod imputers;
pub mod io;
pub mod outliers;
pub mod pipeline;
pub mod quality;
pub mod reporting;
pub mod synthetic;
pub mod target;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::EncounterCleaner;
pub use config::{
    ColumnRole, ColumnTaxonomy, ConfigValidationError, FeatureColumns, PipelineConfig,
    PipelineConfigBuilder, SchemaConfig,
};
pub use dataset::DatasetContainer;
pub use encoding::CategoricalEncoder;
pub use error::{PipelineError, Result, ResultExt};
pub use explorer::DataExplorer;
pub use features::FeatureEngineer;
pub use importance::FeatureScorer;
pub use imputers::MissingValueImputer;
pub use io::{CsvSource, DatasetExporter, ExportFormat, FrameSource, TabularSink, TabularSource};
pub use outliers::OutlierCapper;
pub use pipeline::{
    ClosureProgressReporter, LogEntry, LogLevel, Pipeline, PipelineBuilder, PipelineStage,
    ProgressReporter, ProgressUpdate, RunContext, RunLog, Stage, StageOutput,
};
pub use quality::QualityScorer;
pub use reporting::ReportGenerator;
pub use synthetic::SyntheticEncounters;
pub use target::TargetDeriver;
pub use types::{
    FeatureImportance, FeatureImportanceTable, PipelineResult, QualityScore, RunReport,
    StageRecord,
};
