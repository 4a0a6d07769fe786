//! Final report sections and run artifacts.
//!
//! [`ReportGenerator`] builds the closing sections of the run report
//! (`final_dataset`, `feature_importance_summary`, `processing_summary`) and
//! writes the processed dataset, the feature importance table and the
//! validation report through a [`TabularSink`](crate::io::TabularSink).
//!
//! # Example
//!
//! ```rust,ignore
//! use readmit_processing::io::{DatasetExporter, ExportFormat};
//! use readmit_processing::reporting::ReportGenerator;
//!
//! let exporter = DatasetExporter::new("processed_data");
//! let artifacts = ReportGenerator::write_artifacts(
//!     &exporter,
//!     &result,
//!     &[ExportFormat::Csv, ExportFormat::Json],
//! )?;
//! println!("Report: {}", artifacts.validation_report.display());
//! ```

mod generator;

pub use generator::{ArtifactPaths, ReportGenerator, importance_frame};
