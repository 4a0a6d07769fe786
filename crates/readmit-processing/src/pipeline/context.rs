//! Per-run context handed to every stage.
//!
//! A [`RunContext`] is created for each pipeline execution. Stages log
//! through it instead of writing to a global logger: every message is
//! emitted as a `tracing` event tagged with the run id and stage, and is
//! also captured in the run's own [`RunLog`] so callers can inspect what a
//! particular run did without configuring a subscriber.

use crate::pipeline::progress::{PipelineStage, ProgressReporter, ProgressUpdate};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

/// One captured log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub stage: PipelineStage,
    pub level: LogLevel,
    pub message: String,
}

/// Messages captured during a single run, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn for_stage(&self, stage: PipelineStage) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |entry| entry.stage == stage)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == LogLevel::Warn)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Explicit run state: id, progress sink and captured log.
pub struct RunContext {
    run_id: String,
    reporter: Option<Arc<dyn ProgressReporter>>,
    log: RunLog,
}

static_assertions::assert_impl_all!(RunContext: Send);

impl RunContext {
    pub fn new(reporter: Option<Arc<dyn ProgressReporter>>) -> Self {
        Self {
            run_id: format!("run-{}", Local::now().format("%Y%m%d-%H%M%S%.3f")),
            reporter,
            log: RunLog::default(),
        }
    }

    /// A context with no progress reporter, for running stages on their own.
    pub fn detached() -> Self {
        Self::new(None)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn into_log(self) -> RunLog {
        self.log
    }

    pub fn info(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        info!(run_id = %self.run_id, stage = stage.as_str(), "{}", message);
        self.capture(stage, LogLevel::Info, message);
    }

    pub fn warn(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        warn!(run_id = %self.run_id, stage = stage.as_str(), "{}", message);
        self.capture(stage, LogLevel::Warn, message);
    }

    pub fn debug(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        debug!(run_id = %self.run_id, stage = stage.as_str(), "{}", message);
        self.capture(stage, LogLevel::Debug, message);
    }

    /// Forward a progress update to the reporter, if any.
    pub fn progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.reporter {
            reporter.report(update);
        }
    }

    /// Log and report the start of a stage.
    pub fn begin(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        self.progress(ProgressUpdate::new(stage, 0.0, message.clone()));
        self.info(stage, message);
    }

    /// Log and report the end of a stage.
    pub fn finish(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        self.progress(ProgressUpdate::new(stage, 1.0, message.clone()));
        self.info(stage, message);
    }

    fn capture(&mut self, stage: PipelineStage, level: LogLevel, message: String) {
        self.log.entries.push(LogEntry {
            timestamp: Local::now().to_rfc3339(),
            stage,
            level,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::ClosureProgressReporter;
    use std::sync::Mutex;

    #[test]
    fn test_messages_are_captured_per_run() {
        let mut ctx = RunContext::detached();
        ctx.info(PipelineStage::Cleaning, "removed 3 duplicates");
        ctx.warn(PipelineStage::Imputation, "column 'x' entirely missing");
        ctx.debug(PipelineStage::Cleaning, "rule order fixed");

        assert_eq!(ctx.log().len(), 3);
        assert_eq!(ctx.log().for_stage(PipelineStage::Cleaning).count(), 2);
        let warnings: Vec<_> = ctx.log().warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].stage, PipelineStage::Imputation);
    }

    #[test]
    fn test_separate_runs_do_not_share_logs() {
        let mut first = RunContext::detached();
        let second = RunContext::detached();
        first.info(PipelineStage::Loading, "loaded");
        assert_eq!(first.log().len(), 1);
        assert!(second.log().is_empty());
    }

    #[test]
    fn test_begin_and_finish_report_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage_progress);
        });
        let mut ctx = RunContext::new(Some(Arc::new(reporter)));

        ctx.begin(PipelineStage::Encoding, "encoding");
        ctx.finish(PipelineStage::Encoding, "encoded");

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 1.0]);
        assert_eq!(ctx.log().len(), 2);
    }
}
