//! Error types for the readmission processing pipeline.
//!
//! Every stage reports failures through [`PipelineError`]. The three
//! domain failure kinds are:
//!
//! - [`PipelineError::State`]: a stage was invoked before its prerequisite
//!   stage, or a stage was recorded twice in the same run.
//! - [`PipelineError::Schema`]: a required column is absent or holds values
//!   outside its expected vocabulary.
//! - [`PipelineError::Load`]: the source could not be read as a table.
//!
//! Errors serialize as `{code, message}` so they can be embedded in JSON
//! output produced by the CLI.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage ran out of order or was recorded twice.
    #[error("Stage '{stage}' cannot run: {reason}")]
    State { stage: String, reason: String },

    /// A required column is missing or holds unexpected values.
    #[error("Stage '{stage}' rejected column '{column}': {reason}")]
    Schema {
        stage: String,
        column: String,
        reason: String,
    },

    /// The source could not be read as a table.
    #[error("Failed to load '{source_name}': {reason}")]
    Load { source_name: String, reason: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::State`] error.
    pub fn state(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::State {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PipelineError::Schema`] error.
    pub fn schema(
        stage: impl Into<String>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Schema {
            stage: stage.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PipelineError::Load`] error.
    pub fn load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, preserved through context wrapping.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::State { .. } => "STATE_ERROR",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::Load { .. } => "LOAD_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_state_error(&self) -> bool {
        matches!(self.root(), Self::State { .. })
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self.root(), Self::Schema { .. })
    }

    pub fn is_load_error(&self) -> bool {
        matches!(self.root(), Self::Load { .. })
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
