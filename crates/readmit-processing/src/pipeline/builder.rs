//! Main pipeline module.
//!
//! This module provides the `Pipeline` struct and builder that drive a
//! dataset through every stage in order.

use crate::cleaner::EncounterCleaner;
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::dataset::DatasetContainer;
use crate::encoding::CategoricalEncoder;
use crate::error::Result;
use crate::explorer::DataExplorer;
use crate::features::FeatureEngineer;
use crate::importance::FeatureScorer;
use crate::imputers::MissingValueImputer;
use crate::io::TabularSource;
use crate::outliers::OutlierCapper;
use crate::pipeline::context::RunContext;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::quality::QualityScorer;
use crate::reporting::ReportGenerator;
use crate::target::TargetDeriver;
use crate::types::{PipelineResult, QualityScore};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// The readmission pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use readmit_processing::{CsvSource, Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .enable_outlier_capping(false)
///     .build()?;
///
/// let result = Pipeline::builder()
///     .config(config)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(&CsvSource::new("diabetic_data.csv"))?;
///
/// println!("Quality score: {:.1}", result.quality.overall);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// A pipeline may be handed to a worker thread.
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on the dataset read from `source`.
    ///
    /// # Errors
    ///
    /// The first stage failure is returned, wrapped with the name of the
    /// stage. Nothing after the failing stage runs.
    pub fn run(&self, source: &dyn TabularSource) -> Result<PipelineResult> {
        let started = Instant::now();
        let mut ctx = RunContext::new(self.progress_reporter.clone());

        match self.run_stages(source, &mut ctx) {
            Ok((container, quality)) => {
                ctx.progress(ProgressUpdate::complete("Pipeline completed successfully"));
                let run_id = ctx.run_id().to_string();
                let (dataset, report, feature_importance) = container.into_parts()?;
                Ok(PipelineResult {
                    dataset,
                    report,
                    feature_importance,
                    quality,
                    log: ctx.into_log(),
                    run_id,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                ctx.progress(ProgressUpdate::failed(e.to_string()));
                error!(run_id = %ctx.run_id(), "Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Announce a stage, run it and tag any failure with the stage name.
    fn step<T>(
        ctx: &mut RunContext,
        stage: PipelineStage,
        run: impl FnOnce(&mut RunContext) -> Result<T>,
    ) -> Result<T> {
        ctx.begin(stage, stage.display_name());
        let output = run(ctx).map_err(|e| e.with_context(format!("stage '{}'", stage)))?;
        ctx.finish(stage, format!("{} complete", stage.display_name()));
        Ok(output)
    }

    fn run_stages(
        &self,
        source: &dyn TabularSource,
        ctx: &mut RunContext,
    ) -> Result<(DatasetContainer, QualityScore)> {
        let config = &self.config;
        let schema = &config.schema;
        let mut container = DatasetContainer::new();

        Self::step(ctx, PipelineStage::Loading, |ctx| container.load(source, ctx))?;
        Self::step(ctx, PipelineStage::Exploration, |ctx| {
            container
                .explore(&DataExplorer::new(schema.clone()), ctx)
                .map(|_| ())
        })?;
        Self::step(ctx, PipelineStage::Cleaning, |ctx| {
            container.clean(&EncounterCleaner::new(schema.clone()), ctx)
        })?;
        Self::step(ctx, PipelineStage::TargetCreation, |ctx| {
            container.apply(&TargetDeriver::new(schema.clone()), ctx)
        })?;
        Self::step(ctx, PipelineStage::Imputation, |ctx| {
            container.apply(&MissingValueImputer::from_config(config), ctx)
        })?;

        if config.enable_outlier_capping {
            Self::step(ctx, PipelineStage::OutlierHandling, |ctx| {
                container.apply(&OutlierCapper::from_config(config), ctx)
            })?;
        } else {
            ctx.info(PipelineStage::OutlierHandling, "Outlier capping disabled");
        }

        Self::step(ctx, PipelineStage::FeatureEngineering, |ctx| {
            container.apply(&FeatureEngineer::new(schema.clone()), ctx)
        })?;
        Self::step(ctx, PipelineStage::Encoding, |ctx| {
            container.apply(&CategoricalEncoder::from_config(config), ctx)
        })?;
        Self::step(ctx, PipelineStage::FeatureScoring, |ctx| {
            container
                .score_features(&FeatureScorer::from_config(config), ctx)
                .map(|_| ())
        })?;

        let quality = Self::step(ctx, PipelineStage::Reporting, |ctx| {
            let generator = ReportGenerator::from_config(config);
            let (final_dataset, quality) = {
                let df = container.processed()?;
                (
                    generator.final_dataset(df),
                    QualityScorer::from_config(config).score(df),
                )
            };
            container.record(final_dataset)?;
            let top_features = ReportGenerator::importance_summary(container.feature_importance()?);
            container.record(top_features)?;
            let summary = ReportGenerator::processing_summary(
                ctx.run_id(),
                container.report(),
                quality,
            );
            container.record(summary)?;

            ctx.info(
                PipelineStage::Reporting,
                format!("Data quality score: {:.1}/100", quality.overall),
            );
            Ok(quality)
        })?;

        Ok((container, quality))
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}
