//! Tabular input and output.
//!
//! The pipeline core only depends on the [`TabularSource`] and
//! [`TabularSink`] contracts. [`CsvSource`] and [`DatasetExporter`] are the
//! file-backed implementations used by the CLI.

pub mod export;

pub use export::{DatasetExporter, ExportFormat, TabularSink};

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::path::PathBuf;

/// Rows inspected when inferring CSV column types.
const SCHEMA_INFERENCE_ROWS: usize = 10_000;

/// Something that can produce a table.
pub trait TabularSource {
    /// Human-readable description used in reports and errors.
    fn describe(&self) -> String;

    fn read(&self) -> Result<DataFrame>;
}

/// A delimited text file with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TabularSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<DataFrame> {
        if !self.path.is_file() {
            return Err(PipelineError::load(self.describe(), "file does not exist"));
        }

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(SCHEMA_INFERENCE_ROWS))
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PipelineError::load(self.describe(), e.to_string()))
    }
}

/// An in-memory table.
#[derive(Debug, Clone)]
pub struct FrameSource {
    name: String,
    df: DataFrame,
}

impl FrameSource {
    pub fn new(name: impl Into<String>, df: DataFrame) -> Self {
        Self {
            name: name.into(),
            df,
        }
    }
}

impl TabularSource for FrameSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn read(&self) -> Result<DataFrame> {
        Ok(self.df.clone())
    }
}
