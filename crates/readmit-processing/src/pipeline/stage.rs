//! The stage contract shared by every transforming step.

use crate::error::Result;
use crate::pipeline::context::RunContext;
use crate::pipeline::progress::PipelineStage;
use crate::types::StageRecord;
use polars::prelude::DataFrame;

/// Result of a stage: the new dataset and what the stage did to produce it.
#[derive(Debug, Clone)]
pub struct StageOutput<R> {
    pub data: DataFrame,
    pub report: R,
}

impl<R> StageOutput<R> {
    pub fn new(data: DataFrame, report: R) -> Self {
        Self { data, report }
    }
}

/// A transforming pipeline step.
///
/// `apply` reads a borrowed dataset and returns a new owned one. It must not
/// depend on anything but its input, its own configuration and the context,
/// so a failure leaves the caller's data untouched.
pub trait Stage {
    type Report: Into<StageRecord>;

    fn stage(&self) -> PipelineStage;

    fn apply(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<StageOutput<Self::Report>>;
}
