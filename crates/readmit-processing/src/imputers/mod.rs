//! Missing value imputation.
//!
//! - Text columns take their most frequent value, or the unknown marker
//!   when nothing was observed.
//! - Numeric columns with a small missing share take the median; the rest
//!   use single-column KNN imputation.

mod knn;
mod statistical;

pub use knn::KNNImputer;
pub use statistical::{StatisticalImputer, UNKNOWN_MARKER};

use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::pipeline::{PipelineStage, ProgressUpdate, RunContext, Stage, StageOutput};
use crate::types::{ColumnImputation, ImputationReport, ImputationStrategy};
use crate::utils::{DtypeCategory, get_dtype_category};
use polars::prelude::*;

/// Fills every missing cell of the dataset.
#[derive(Debug, Clone)]
pub struct MissingValueImputer {
    knn_neighbors: usize,
    missing_share_cutoff: f64,
}

impl MissingValueImputer {
    pub fn new(knn_neighbors: usize, missing_share_cutoff: f64) -> Self {
        Self {
            knn_neighbors,
            missing_share_cutoff,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.knn_neighbors, config.missing_share_cutoff)
    }

    fn impute_numeric(
        &self,
        series: &Series,
        missing_share: f64,
        ctx: &mut RunContext,
    ) -> PolarsResult<(Series, ImputationStrategy)> {
        let name = series.name().to_string();

        let filled = if missing_share < self.missing_share_cutoff {
            StatisticalImputer::median_fill(series)?.map(|(s, fill)| {
                ctx.debug(
                    PipelineStage::Imputation,
                    format!("'{}': median {:.3}", name, fill),
                );
                (s, ImputationStrategy::Median)
            })
        } else {
            KNNImputer::new(self.knn_neighbors)
                .fit_transform(series)?
                .map(|(s, fill)| {
                    ctx.debug(
                        PipelineStage::Imputation,
                        format!(
                            "'{}': {:.1}% missing, KNN estimate {:.3}",
                            name,
                            missing_share * 100.0,
                            fill
                        ),
                    );
                    (s, ImputationStrategy::Knn)
                })
        };

        match filled {
            Some(result) => Ok(result),
            None => {
                ctx.warn(
                    PipelineStage::Imputation,
                    format!("'{}' has no observed values; filled with 0", name),
                );
                Ok((
                    StatisticalImputer::constant_fill(series, 0.0)?,
                    ImputationStrategy::ZeroFill,
                ))
            }
        }
    }

    fn impute_boolean(&self, series: &Series) -> PolarsResult<(Series, ImputationStrategy)> {
        match StatisticalImputer::boolean_mode_fill(series)? {
            Some((filled, _)) => Ok((filled, ImputationStrategy::Mode)),
            None => Ok((
                StatisticalImputer::unknown_fill(series)?,
                ImputationStrategy::UnknownMarker,
            )),
        }
    }

    fn impute_text(&self, series: &Series) -> PolarsResult<(Series, ImputationStrategy)> {
        match StatisticalImputer::mode_fill(series)? {
            Some((filled, _)) => Ok((filled, ImputationStrategy::Mode)),
            None => Ok((
                StatisticalImputer::unknown_fill(series)?,
                ImputationStrategy::UnknownMarker,
            )),
        }
    }
}

impl Stage for MissingValueImputer {
    type Report = ImputationReport;

    fn stage(&self) -> PipelineStage {
        PipelineStage::Imputation
    }

    fn apply(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<StageOutput<ImputationReport>> {
        let height = df.height();
        let mut data = df.clone();
        let mut report = ImputationReport {
            missing_before: df.get_columns().iter().map(|c| c.null_count()).sum(),
            ..ImputationReport::default()
        };

        let targets: Vec<&Column> = df
            .get_columns()
            .iter()
            .filter(|c| c.null_count() > 0)
            .collect();
        let total = targets.len();

        for (idx, column) in targets.into_iter().enumerate() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();
            let missing_before = series.null_count();
            let missing_share = missing_before as f64 / height as f64;

            ctx.progress(ProgressUpdate::with_items(
                PipelineStage::Imputation,
                format!("Column: {}", name),
                idx,
                total,
                format!("Imputing '{}'", name),
            ));

            let (filled, strategy) = match get_dtype_category(series.dtype()) {
                DtypeCategory::Numeric => self.impute_numeric(series, missing_share, ctx),
                DtypeCategory::Boolean => self.impute_boolean(series),
                DtypeCategory::String | DtypeCategory::Null | DtypeCategory::Other => {
                    self.impute_text(series)
                }
            }
            .context(format!("Imputing column '{}'", name))?;

            let missing_after = filled.null_count();
            data.replace(&name, filled)
                .context(format!("Replacing column '{}'", name))?;

            if strategy == ImputationStrategy::UnknownMarker {
                ctx.warn(
                    PipelineStage::Imputation,
                    format!("'{}' has no observed values; filled with '{}'", name, UNKNOWN_MARKER),
                );
            }

            report.strategies.push(ColumnImputation {
                column: name,
                missing_before,
                missing_after,
                strategy,
            });
        }

        report.missing_after = data.get_columns().iter().map(|c| c.null_count()).sum();
        ctx.info(
            PipelineStage::Imputation,
            format!(
                "Imputed {} columns: {} missing cells before, {} after",
                report.strategies.len(),
                report.missing_before,
                report.missing_after
            ),
        );

        Ok(StageOutput::new(data, report))
    }
}
