//! File export of the processed dataset and run artifacts.

use crate::error::{PipelineError, Result, ResultExt};
use crate::utils::normalize_column_name;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File format of an exported table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }

    pub fn all() -> [ExportFormat; 3] {
        [Self::Csv, Self::Json, Self::Parquet]
    }
}

/// Somewhere tables and JSON documents can be written.
pub trait TabularSink {
    /// Write `df` under the artifact name `name` in `format`.
    fn write_table(&self, name: &str, df: &DataFrame, format: ExportFormat) -> Result<PathBuf>;

    /// Write a JSON document under the artifact name `name`.
    fn write_json(&self, name: &str, value: &serde_json::Value) -> Result<PathBuf>;
}

/// Writes artifacts into a directory, normalizing column names on the way out.
#[derive(Debug, Clone)]
pub struct DatasetExporter {
    output_dir: PathBuf,
}

impl DatasetExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Copy of `df` with export-normalized column names.
    ///
    /// Fails if two columns collapse to the same normalized name.
    pub fn normalize_columns(df: &DataFrame) -> Result<DataFrame> {
        let mut normalized = df.clone();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| normalize_column_name(name.as_str()))
            .collect();

        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(PipelineError::InvalidConfig(format!(
                "column name '{}' appears twice after normalization",
                duplicate
            )));
        }

        normalized
            .set_column_names(names)
            .context("Normalizing column names")?;
        Ok(normalized)
    }

    fn path_for(&self, name: &str, extension: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(format!("{}.{}", name, extension)))
    }
}

impl TabularSink for DatasetExporter {
    fn write_table(&self, name: &str, df: &DataFrame, format: ExportFormat) -> Result<PathBuf> {
        let mut df = Self::normalize_columns(df)?;
        let path = self.path_for(name, format.extension())?;
        let mut file = File::create(&path)?;

        match format {
            ExportFormat::Csv => {
                CsvWriter::new(&mut file)
                    .include_header(true)
                    .with_separator(b',')
                    .finish(&mut df)
                    .context("Writing CSV")?;
            }
            ExportFormat::Json => {
                JsonWriter::new(&mut file)
                    .with_json_format(JsonFormat::Json)
                    .finish(&mut df)
                    .context("Writing JSON")?;
            }
            ExportFormat::Parquet => {
                ParquetWriter::new(&mut file)
                    .finish(&mut df)
                    .context("Writing Parquet")?;
            }
        }

        info!("Saved {}: {}", format.extension(), path.display());
        Ok(path)
    }

    fn write_json(&self, name: &str, value: &serde_json::Value) -> Result<PathBuf> {
        let path = self.path_for(name, "json")?;
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;

        info!("Saved report: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df!(
            "glyburide-metformin" => ["No", "Up"],
            "A1Cresult" => [1.0, 2.0],
            "Max Glu" => [1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_columns() {
        let normalized = DatasetExporter::normalize_columns(&sample()).unwrap();
        let names: Vec<String> = normalized
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["glyburide_metformin", "a1cresult", "max_glu"]);
    }

    #[test]
    fn test_normalize_columns_rejects_collisions() {
        let df = df!("a-b" => [1], "a b" => [2]).unwrap();
        assert!(DatasetExporter::normalize_columns(&df).is_err());
    }

    #[test]
    fn test_write_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DatasetExporter::new(dir.path());

        for format in ExportFormat::all() {
            let path = exporter.write_table("processed", &sample(), format).unwrap();
            assert!(path.is_file());
            assert_eq!(path.extension().unwrap(), format.extension());
        }

        let csv = fs::read_to_string(dir.path().join("processed.csv")).unwrap();
        assert!(csv.starts_with("glyburide_metformin,a1cresult,max_glu"));
    }

    #[test]
    fn test_write_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DatasetExporter::new(dir.path().join("nested"));
        let path = exporter
            .write_json("report", &serde_json::json!({"rows": 2}))
            .unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("\"rows\": 2"));
    }
}
