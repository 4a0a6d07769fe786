//! Read-only exploration of the raw dataset.

use crate::config::SchemaConfig;
use crate::error::{Result, ResultExt};
use crate::pipeline::{PipelineStage, RunContext};
use crate::types::{ColumnExploration, ExplorationSnapshot};
use crate::utils::{memory_usage_mb, percentage, string_values};
use polars::prelude::*;
use std::collections::BTreeMap;

const UNCLASSIFIED: &str = "unclassified";

/// Produces an [`ExplorationSnapshot`] without modifying the data.
#[derive(Debug, Clone)]
pub struct DataExplorer {
    schema: SchemaConfig,
}

impl DataExplorer {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    pub fn explore(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<ExplorationSnapshot> {
        let height = df.height();
        let mut columns = Vec::with_capacity(df.width());
        let mut columns_by_role: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();
            let missing_count = series.null_count();
            let unique_count = series
                .drop_nulls()
                .n_unique()
                .context(format!("Counting distinct values of '{}'", name))?;
            let role = self.schema.taxonomy.role_of(&name);

            let group = role.map(|r| r.as_str()).unwrap_or(UNCLASSIFIED);
            columns_by_role
                .entry(group.to_string())
                .or_default()
                .push(name.clone());

            columns.push(ColumnExploration {
                name,
                dtype: series.dtype().to_string(),
                missing_count,
                missing_percentage: percentage(missing_count, height),
                unique_count,
                role,
            });
        }

        let outcome_distribution = match df.column(&self.schema.outcome_column) {
            Ok(column) => Some(value_counts(column.as_materialized_series())?),
            Err(_) => {
                ctx.warn(
                    PipelineStage::Exploration,
                    format!(
                        "Outcome column '{}' not present; skipping its distribution",
                        self.schema.outcome_column
                    ),
                );
                None
            }
        };

        let snapshot = ExplorationSnapshot {
            shape: df.shape(),
            columns,
            columns_by_role,
            memory_usage_mb: memory_usage_mb(df),
            outcome_distribution,
        };

        let total_missing: usize = snapshot.columns.iter().map(|c| c.missing_count).sum();
        ctx.info(
            PipelineStage::Exploration,
            format!(
                "Explored {} rows x {} columns ({:.2} MB, {} missing cells)",
                height,
                df.width(),
                snapshot.memory_usage_mb,
                total_missing
            ),
        );

        Ok(snapshot)
    }
}

/// Occurrences of each non-missing value, keyed by its text form.
fn value_counts(series: &Series) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for value in string_values(series)?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnRole;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_explore_reports_columns_and_outcome() {
        let df = df!(
            "gender" => [Some("Male"), Some("Female"), None, Some("Male")],
            "insulin" => ["No", "Up", "No", "Steady"],
            "custom_flag" => [1, 2, 2, 1],
            "readmitted" => ["NO", "<30", "NO", ">30"]
        )
        .unwrap();
        let mut ctx = RunContext::detached();

        let snapshot = DataExplorer::new(SchemaConfig::default())
            .explore(&df, &mut ctx)
            .unwrap();

        assert_eq!(snapshot.shape, (4, 4));
        let gender = &snapshot.columns[0];
        assert_eq!(gender.missing_count, 1);
        assert_eq!(gender.missing_percentage, 25.0);
        assert_eq!(gender.unique_count, 2);
        assert_eq!(gender.role, Some(ColumnRole::Demographic));

        assert_eq!(
            snapshot.columns_by_role.get("unclassified"),
            Some(&vec!["custom_flag".to_string(), "readmitted".to_string()])
        );
        assert_eq!(
            snapshot.outcome_distribution,
            Some(BTreeMap::from([
                ("<30".to_string(), 1),
                (">30".to_string(), 1),
                ("NO".to_string(), 2),
            ]))
        );
    }

    #[test]
    fn test_explore_tolerates_missing_outcome() {
        let df = df!("age" => ["[70-80)"]).unwrap();
        let mut ctx = RunContext::detached();
        let snapshot = DataExplorer::new(SchemaConfig::default())
            .explore(&df, &mut ctx)
            .unwrap();

        assert_eq!(snapshot.outcome_distribution, None);
        assert_eq!(ctx.log().warnings().count(), 1);
    }
}
