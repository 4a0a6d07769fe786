//! Derived clinical features.
//!
//! Every feature is computed from named source columns. When a source column
//! is absent the feature is skipped and listed in the report rather than
//! failing the run.

pub mod age;

use crate::config::{ColumnRole, SchemaConfig};
use crate::error::{Result, ResultExt};
use crate::pipeline::{PipelineStage, RunContext, Stage, StageOutput};
use crate::types::{FeatureEngineeringReport, SkippedFeature};
use crate::utils::{median, numeric_values, string_values};
use polars::prelude::*;

pub const AGE_NUMERIC: &str = "age_numeric";
pub const AGE_GROUP: &str = "age_group";
pub const TOTAL_MEDICATIONS_CHANGED: &str = "total_medications_changed";
pub const DIAGNOSIS_COUNT: &str = "diagnosis_count";
pub const TOTAL_PRIOR_VISITS: &str = "total_prior_visits";
pub const HIGH_RISK_PATIENT: &str = "high_risk_patient";
pub const MEDICATION_CHANGED: &str = "medication_changed";
pub const ON_DIABETES_MED: &str = "on_diabetes_med";
pub const LAB_PROCEDURES_PER_DAY: &str = "lab_procedures_per_day";

/// Adds the derived features to the dataset.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    schema: SchemaConfig,
}

/// Features computed so far, and those that could not be.
#[derive(Default)]
struct Derived {
    columns: Vec<Series>,
    skipped: Vec<SkippedFeature>,
}

impl Derived {
    fn add(&mut self, name: &str, series: Series) {
        self.columns.push(series.with_name(name.into()));
    }

    fn skip(&mut self, name: &str, missing_columns: &[String]) {
        self.skipped.push(SkippedFeature {
            feature: name.to_string(),
            missing_columns: missing_columns.to_vec(),
        });
    }
}

fn absent(df: &DataFrame, columns: &[&String]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| df.column(c.as_str()).is_err())
        .map(|c| c.to_string())
        .collect()
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    string_values(column.as_materialized_series()).context(format!("Reading '{}'", name))
}

fn number_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?;
    numeric_values(column.as_materialized_series()).context(format!("Reading '{}'", name))
}

fn indicator(values: &[Option<String>], positive: &str) -> Vec<i32> {
    values
        .iter()
        .map(|v| i32::from(v.as_deref() == Some(positive)))
        .collect()
}

impl FeatureEngineer {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    fn age_features(&self, df: &DataFrame, out: &mut Derived, ctx: &mut RunContext) -> Result<()> {
        let f = &self.schema.features;
        let missing = absent(df, &[&f.age_column]);
        if !missing.is_empty() {
            out.skip(AGE_NUMERIC, &missing);
            out.skip(AGE_GROUP, &missing);
            return Ok(());
        }

        let brackets = text_column(df, &f.age_column)?;
        let numeric: Vec<Option<f64>> = brackets
            .iter()
            .map(|b| b.as_deref().and_then(age::bracket_midpoint))
            .collect();
        let groups: Vec<Option<&str>> = numeric
            .iter()
            .map(|a| a.and_then(|v| age::age_group(v, &f.age_bins, &f.age_labels)))
            .collect();

        let unparsed = brackets.iter().zip(&numeric).filter(|(b, n)| b.is_some() && n.is_none()).count();
        if unparsed > 0 {
            ctx.warn(
                PipelineStage::FeatureEngineering,
                format!("{} '{}' values are not age brackets", unparsed, f.age_column),
            );
        }

        out.add(AGE_NUMERIC, Series::new(AGE_NUMERIC.into(), numeric));
        out.add(AGE_GROUP, Series::new(AGE_GROUP.into(), groups));
        Ok(())
    }

    fn medication_changes(&self, df: &DataFrame, out: &mut Derived) -> Result<()> {
        let medications: Vec<&String> = self
            .schema
            .taxonomy
            .columns(ColumnRole::Medication)
            .iter()
            .filter(|c| df.column(c.as_str()).is_ok())
            .collect();
        if medications.is_empty() {
            out.skip(
                TOTAL_MEDICATIONS_CHANGED,
                self.schema.taxonomy.columns(ColumnRole::Medication),
            );
            return Ok(());
        }

        let unchanged = &self.schema.features.unchanged_medication_values;
        let mut counts = vec![0_i32; df.height()];
        for medication in medications {
            for (count, value) in counts.iter_mut().zip(text_column(df, medication)?) {
                if value.is_some_and(|v| !unchanged.contains(&v)) {
                    *count += 1;
                }
            }
        }

        out.add(
            TOTAL_MEDICATIONS_CHANGED,
            Series::new(TOTAL_MEDICATIONS_CHANGED.into(), counts),
        );
        Ok(())
    }

    fn diagnosis_count(&self, df: &DataFrame, out: &mut Derived) -> Result<()> {
        let diagnoses = &self.schema.features.diagnosis_columns;
        let present: Vec<&String> = diagnoses
            .iter()
            .filter(|c| df.column(c.as_str()).is_ok())
            .collect();
        if present.is_empty() {
            out.skip(DIAGNOSIS_COUNT, diagnoses);
            return Ok(());
        }

        let mut counts = vec![0_i32; df.height()];
        for column in present {
            for (count, value) in counts.iter_mut().zip(text_column(df, column)?) {
                *count += i32::from(value.is_some());
            }
        }

        out.add(DIAGNOSIS_COUNT, Series::new(DIAGNOSIS_COUNT.into(), counts));
        Ok(())
    }

    fn prior_visits(&self, df: &DataFrame, out: &mut Derived) -> Result<()> {
        let visits = &self.schema.features.utilization_columns;
        let missing = absent(df, &visits.iter().collect::<Vec<_>>());
        if !missing.is_empty() {
            out.skip(TOTAL_PRIOR_VISITS, &missing);
            return Ok(());
        }

        let mut totals = vec![0.0_f64; df.height()];
        for column in visits {
            for (total, value) in totals.iter_mut().zip(number_column(df, column)?) {
                *total += value.unwrap_or(0.0);
            }
        }

        out.add(TOTAL_PRIOR_VISITS, Series::new(TOTAL_PRIOR_VISITS.into(), totals));
        Ok(())
    }

    fn stay_features(&self, df: &DataFrame, out: &mut Derived) -> Result<()> {
        let f = &self.schema.features;

        let missing = absent(df, &[&f.stay_length_column, &f.procedure_count_column]);
        if missing.is_empty() {
            let stay = number_column(df, &f.stay_length_column)?;
            let procedures = number_column(df, &f.procedure_count_column)?;
            let high_risk: Vec<i32> = match (median(&stay), median(&procedures)) {
                (Some(stay_median), Some(procedure_median)) => stay
                    .iter()
                    .zip(&procedures)
                    .map(|(s, p)| {
                        let long_stay = s.is_some_and(|v| v > stay_median);
                        let many_procedures = p.is_some_and(|v| v > procedure_median);
                        i32::from(long_stay && many_procedures)
                    })
                    .collect(),
                _ => vec![0; df.height()],
            };
            out.add(HIGH_RISK_PATIENT, Series::new(HIGH_RISK_PATIENT.into(), high_risk));
        } else {
            out.skip(HIGH_RISK_PATIENT, &missing);
        }

        let missing = absent(df, &[&f.lab_procedure_column, &f.stay_length_column]);
        if missing.is_empty() {
            let labs = number_column(df, &f.lab_procedure_column)?;
            let stay = number_column(df, &f.stay_length_column)?;
            let per_day: Vec<Option<f64>> = labs
                .iter()
                .zip(&stay)
                .map(|(l, s)| match (l, s) {
                    (Some(l), Some(s)) => Some(l / (s + 1.0)),
                    _ => None,
                })
                .collect();
            out.add(
                LAB_PROCEDURES_PER_DAY,
                Series::new(LAB_PROCEDURES_PER_DAY.into(), per_day),
            );
        } else {
            out.skip(LAB_PROCEDURES_PER_DAY, &missing);
        }

        Ok(())
    }

    fn indicators(&self, df: &DataFrame, out: &mut Derived) -> Result<()> {
        let f = &self.schema.features;
        for (feature, column, positive) in [
            (MEDICATION_CHANGED, &f.change_column, &f.change_positive_value),
            (ON_DIABETES_MED, &f.diabetes_med_column, &f.diabetes_med_positive_value),
        ] {
            let missing = absent(df, &[column]);
            if missing.is_empty() {
                let flags = indicator(&text_column(df, column)?, positive);
                out.add(feature, Series::new(feature.into(), flags));
            } else {
                out.skip(feature, &missing);
            }
        }
        Ok(())
    }
}

impl Stage for FeatureEngineer {
    type Report = FeatureEngineeringReport;

    fn stage(&self) -> PipelineStage {
        PipelineStage::FeatureEngineering
    }

    fn apply(
        &self,
        df: &DataFrame,
        ctx: &mut RunContext,
    ) -> Result<StageOutput<FeatureEngineeringReport>> {
        let mut derived = Derived::default();
        self.age_features(df, &mut derived, ctx)?;
        self.medication_changes(df, &mut derived)?;
        self.diagnosis_count(df, &mut derived)?;
        self.prior_visits(df, &mut derived)?;
        self.stay_features(df, &mut derived)?;
        self.indicators(df, &mut derived)?;

        let mut data = df.clone();
        let mut engineered = Vec::with_capacity(derived.columns.len());
        for series in derived.columns {
            engineered.push(series.name().to_string());
            data.with_column(series)
                .context("Adding engineered feature")?;
        }

        for skipped in &derived.skipped {
            ctx.warn(
                PipelineStage::FeatureEngineering,
                format!(
                    "Skipped '{}': missing {}",
                    skipped.feature,
                    skipped.missing_columns.join(", ")
                ),
            );
        }

        let report = FeatureEngineeringReport {
            engineered_features: engineered,
            skipped_features: derived.skipped,
            total_features_before: df.width(),
            total_features_after: data.width(),
        };
        ctx.info(
            PipelineStage::FeatureEngineering,
            format!(
                "Added {} features ({} -> {} columns)",
                report.engineered_features.len(),
                report.total_features_before,
                report.total_features_after
            ),
        );

        Ok(StageOutput::new(data, report))
    }
}
