//! Record cleaning for encounter data.
//!
//! Rules run in a fixed order:
//! 1. Remove exact duplicate rows
//! 2. Normalize the missing-value sentinel to real missing values
//! 3. Remove rows with a missing patient identifier
//! 4. Remove rows with a missing weight
//! 5. Remove rows discharged to death or hospice
//! 6. Keep only recognized gender values
//! 7. Remove repeated encounter identifiers, keeping the first
//!
//! A rule whose column is absent is skipped and listed in the report.

pub mod rules;

use crate::config::SchemaConfig;
use crate::error::{Result, ResultExt};
use crate::pipeline::{PipelineStage, RunContext, Stage, StageOutput};
use crate::types::CleaningReport;
use crate::utils::percentage;
use polars::prelude::*;

/// Applies the cleaning rules to the raw dataset.
#[derive(Debug, Clone)]
pub struct EncounterCleaner {
    schema: SchemaConfig,
}

impl EncounterCleaner {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    /// Run `rule` against `column`, or record the rule as skipped when the
    /// column is absent. Returns the rows removed.
    fn run_column_rule<F>(
        &self,
        df: &mut DataFrame,
        column: &str,
        description: &str,
        report: &mut CleaningReport,
        ctx: &mut RunContext,
        rule: F,
    ) -> Result<usize>
    where
        F: FnOnce(&DataFrame, &str) -> PolarsResult<(DataFrame, usize)>,
    {
        if df.column(column).is_err() {
            ctx.warn(
                PipelineStage::Cleaning,
                format!("Column '{}' absent; skipped: {}", column, description),
            );
            report.skipped_rules.push(description.to_string());
            return Ok(0);
        }

        let before = df.height();
        let (cleaned, removed) = rule(df, column).context(description)?;
        *df = cleaned;

        report.cleaning_steps.push(format!(
            "{}: removed {} rows ({:.1}%)",
            description,
            removed,
            percentage(removed, before)
        ));
        ctx.debug(
            PipelineStage::Cleaning,
            format!("{}: removed {} rows", description, removed),
        );
        Ok(removed)
    }
}

impl Stage for EncounterCleaner {
    type Report = CleaningReport;

    fn stage(&self) -> PipelineStage {
        PipelineStage::Cleaning
    }

    fn apply(&self, df: &DataFrame, ctx: &mut RunContext) -> Result<StageOutput<CleaningReport>> {
        let schema = &self.schema;
        let mut report = CleaningReport {
            rows_before: df.height(),
            ..CleaningReport::default()
        };

        let (mut df, duplicates) =
            rules::drop_exact_duplicates(df).context("Removing duplicate rows")?;
        report.duplicates_removed = duplicates;
        report
            .cleaning_steps
            .push(format!("Removed {} exact duplicate rows", duplicates));

        let (normalized, cells) = rules::normalize_sentinel(&df, &schema.missing_sentinel)
            .context("Normalizing missing-value sentinel")?;
        df = normalized;
        report.sentinel_cells_normalized = cells;
        report.cleaning_steps.push(format!(
            "Replaced {} '{}' cells with missing values",
            cells, schema.missing_sentinel
        ));

        report.missing_patient_id_removed = self.run_column_rule(
            &mut df,
            &schema.patient_id_column,
            "Remove rows with missing patient id",
            &mut report,
            ctx,
            rules::drop_missing,
        )?;

        report.missing_weight_removed = self.run_column_rule(
            &mut df,
            &schema.weight_column,
            "Remove rows with missing weight",
            &mut report,
            ctx,
            rules::drop_missing,
        )?;

        report.excluded_discharge_removed = self.run_column_rule(
            &mut df,
            &schema.discharge_column,
            "Remove death/hospice discharges",
            &mut report,
            ctx,
            |df, column| rules::drop_codes(df, column, &schema.excluded_discharge_codes),
        )?;

        report.invalid_gender_removed = self.run_column_rule(
            &mut df,
            &schema.gender_column,
            "Keep recognized gender values",
            &mut report,
            ctx,
            |df, column| rules::keep_allowed(df, column, &schema.allowed_genders),
        )?;

        report.duplicate_encounters_removed = self.run_column_rule(
            &mut df,
            &schema.encounter_id_column,
            "Remove repeated encounter ids",
            &mut report,
            ctx,
            rules::drop_duplicate_keys,
        )?;

        report.records_after_cleaning = df.height();
        ctx.info(
            PipelineStage::Cleaning,
            format!(
                "Cleaning kept {} of {} records ({:.1}%)",
                report.records_after_cleaning,
                report.rows_before,
                percentage(report.records_after_cleaning, report.rows_before)
            ),
        );

        Ok(StageOutput::new(df, report))
    }
}
