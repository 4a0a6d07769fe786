//! Pipeline module.
//!
//! This module provides the pipeline driver, the stage contract and the
//! per-run context and progress reporting.

mod builder;
pub mod context;
pub mod progress;
pub mod stage;

pub use builder::{Pipeline, PipelineBuilder};
pub use context::{LogEntry, LogLevel, RunContext, RunLog};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
pub use stage::{Stage, StageOutput};
