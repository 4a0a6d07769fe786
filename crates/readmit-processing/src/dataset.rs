//! The dataset container: raw data, processed data and the run report.

use crate::cleaner::EncounterCleaner;
use crate::error::{PipelineError, Result};
use crate::explorer::DataExplorer;
use crate::importance::FeatureScorer;
use crate::io::TabularSource;
use crate::pipeline::{PipelineStage, RunContext, Stage};
use crate::types::{
    ExplorationSnapshot, FeatureImportanceTable, ImportanceReport, LoadReport, RunReport,
    StageRecord,
};
use polars::prelude::*;

/// Holds one run's data and report.
///
/// The cleaner turns `raw` into the first `processed` frame; every later
/// stage reads `processed` and replaces it. A stage's output is committed
/// only after it has succeeded and its report entry was accepted, so a
/// failing stage leaves the container as it was.
#[derive(Debug, Clone, Default)]
pub struct DatasetContainer {
    raw: Option<DataFrame>,
    processed: Option<DataFrame>,
    report: RunReport,
    feature_importance: Option<FeatureImportanceTable>,
}

impl DatasetContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the source into `raw` and record its original shape.
    pub fn load(&mut self, source: &dyn TabularSource, ctx: &mut RunContext) -> Result<()> {
        if self.raw.is_some() {
            return Err(PipelineError::state(
                PipelineStage::Loading.as_str(),
                "a dataset is already loaded",
            ));
        }

        let name = source.describe();
        let df = source.read()?;
        if df.width() == 0 {
            return Err(PipelineError::load(&name, "source has no columns"));
        }

        let report = LoadReport {
            source: name,
            original_shape: df.shape(),
            original_columns: df
                .get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        };
        ctx.info(
            PipelineStage::Loading,
            format!(
                "Loaded {} rows x {} columns from {}",
                df.height(),
                df.width(),
                report.source
            ),
        );

        self.report.record(report)?;
        self.raw = Some(df);
        Ok(())
    }

    pub fn raw(&self) -> Result<&DataFrame> {
        self.raw.as_ref().ok_or_else(|| {
            PipelineError::state(PipelineStage::Loading.as_str(), "no dataset has been loaded")
        })
    }

    pub fn processed(&self) -> Result<&DataFrame> {
        self.processed.as_ref().ok_or_else(|| {
            PipelineError::state(
                PipelineStage::Cleaning.as_str(),
                "the dataset has not been cleaned yet",
            )
        })
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn feature_importance(&self) -> Result<&FeatureImportanceTable> {
        self.feature_importance.as_ref().ok_or_else(|| {
            PipelineError::state(
                PipelineStage::FeatureScoring.as_str(),
                "features have not been scored yet",
            )
        })
    }

    /// Snapshot the raw dataset and record it as `exploration`.
    pub fn explore(
        &mut self,
        explorer: &DataExplorer,
        ctx: &mut RunContext,
    ) -> Result<ExplorationSnapshot> {
        let snapshot = explorer.explore(self.raw()?, ctx)?;
        self.report.record(snapshot.clone())?;
        Ok(snapshot)
    }

    /// Clean `raw` into the first processed frame.
    pub fn clean(&mut self, cleaner: &EncounterCleaner, ctx: &mut RunContext) -> Result<()> {
        let output = cleaner.apply(self.raw()?, ctx)?;
        self.report.record(output.report)?;
        self.processed = Some(output.data);
        Ok(())
    }

    /// Run a stage on the processed frame and commit its output.
    pub fn apply<S: Stage>(&mut self, stage: &S, ctx: &mut RunContext) -> Result<()> {
        let output = stage.apply(self.processed()?, ctx)?;
        self.report.record(output.report)?;
        self.processed = Some(output.data);
        Ok(())
    }

    /// Score the features of the processed frame.
    pub fn score_features(
        &mut self,
        scorer: &FeatureScorer,
        ctx: &mut RunContext,
    ) -> Result<&FeatureImportanceTable> {
        let table = scorer.score(self.processed()?, ctx)?;
        self.report.record(ImportanceReport::from_table(&table))?;
        Ok(self.feature_importance.insert(table))
    }

    /// Append a report entry that does not come from a stage.
    pub fn record(&mut self, record: impl Into<StageRecord>) -> Result<()> {
        self.report.record(record)
    }

    /// Final frame, report and importance table.
    pub fn into_parts(self) -> Result<(DataFrame, RunReport, FeatureImportanceTable)> {
        let processed = self.processed.ok_or_else(|| {
            PipelineError::state(
                PipelineStage::Reporting.as_str(),
                "the dataset has not been cleaned yet",
            )
        })?;
        Ok((
            processed,
            self.report,
            self.feature_importance.unwrap_or_default(),
        ))
    }
}
