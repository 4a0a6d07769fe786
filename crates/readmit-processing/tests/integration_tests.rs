//! Integration tests for the readmission pipeline.
//!
//! These tests drive the full pipeline and the dataset container on
//! synthetic encounter data.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use readmit_processing::cleaner::EncounterCleaner;
use readmit_processing::types::ImputationStrategy;
use readmit_processing::{
    CsvSource, DatasetContainer, DatasetExporter, ExportFormat, FrameSource, MissingValueImputer,
    Pipeline, PipelineConfig, PipelineResult, PipelineStage, ReportGenerator, RunContext,
    SchemaConfig, StageRecord, SyntheticEncounters, TargetDeriver,
};
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

/// A small forest keeps the tests fast.
fn fast_config() -> PipelineConfig {
    PipelineConfig::builder().forest_trees(10).build().unwrap()
}

fn run_on(df: DataFrame, config: PipelineConfig) -> PipelineResult {
    Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run(&FrameSource::new("synthetic", df))
        .expect("Pipeline should complete successfully")
}

fn total_missing(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_on_synthetic_encounters() {
    let df = SyntheticEncounters::new(1000).generate().unwrap();
    let result = run_on(df, fast_config());

    // the 50 unknown weights are the only rows removed
    assert_eq!(result.dataset.height(), 950);

    let labels: Vec<i32> = result
        .dataset
        .column("readmitted_30_days")
        .unwrap()
        .i32()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(labels.len(), 950);
    assert!(labels.iter().all(|l| *l == 0 || *l == 1));

    assert_eq!(
        result.report.keys(),
        vec![
            "original",
            "exploration",
            "cleaning",
            "target_creation",
            "missing_value_handling",
            "outlier_handling",
            "feature_engineering",
            "categorical_encoding",
            "feature_importance",
            "final_dataset",
            "feature_importance_summary",
            "processing_summary",
        ]
    );

    match result.report.get("missing_value_handling") {
        Some(StageRecord::MissingValueHandling(report)) => {
            assert!(report.missing_before > 0);
            assert_eq!(report.missing_after, 0);
        }
        other => panic!("unexpected imputation record: {:?}", other),
    }
    assert_eq!(total_missing(&result.dataset), 0);

    match result.report.get("processing_summary") {
        Some(StageRecord::ProcessingSummary(summary)) => {
            assert_eq!(summary.total_processing_steps, 11);
            assert_eq!(summary.run_id, result.run_id);
        }
        other => panic!("unexpected summary record: {:?}", other),
    }

    let quality = result.quality;
    assert!(quality.overall.is_finite());
    assert!((0.0..=100.0).contains(&quality.overall));
    assert_eq!(quality.completeness, 100.0);
    assert!(quality.class_balance.is_some());
}

#[test]
fn test_feature_importance_is_normalized_and_sorted() {
    let df = SyntheticEncounters::new(300).generate().unwrap();
    let result = run_on(df, fast_config());
    let table = &result.feature_importance;

    assert!(!table.is_empty());
    for row in &table.rows {
        assert!((0.0..=1.0).contains(&row.combined_score), "{}", row.feature);
        assert!((0.0..=1.0).contains(&row.rf_importance_norm));
        assert!((0.0..=1.0).contains(&row.mi_score_norm));
    }
    assert!(
        table
            .rows
            .windows(2)
            .all(|w| w[0].combined_score >= w[1].combined_score)
    );

    for excluded in ["encounter_id", "patient_nbr", "readmitted_30_days"] {
        assert!(table.get(excluded).is_none(), "{} was scored", excluded);
    }
    // engineered features take part in scoring
    assert!(table.get("total_prior_visits").is_some());
}

#[test]
fn test_disabled_capping_skips_stage() {
    let config = PipelineConfig::builder()
        .forest_trees(5)
        .enable_outlier_capping(false)
        .build()
        .unwrap();
    let result = run_on(SyntheticEncounters::new(200).generate().unwrap(), config);

    assert!(!result.report.contains("outlier_handling"));
    assert!(
        result
            .log
            .for_stage(PipelineStage::OutlierHandling)
            .any(|entry| entry.message.contains("disabled"))
    );
}

#[test]
fn test_progress_ends_with_complete() {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);

    Pipeline::builder()
        .config(fast_config())
        .on_progress(move |update| {
            sink.lock().unwrap().push((update.stage, update.progress));
        })
        .build()
        .unwrap()
        .run(&FrameSource::new(
            "synthetic",
            SyntheticEncounters::new(200).generate().unwrap(),
        ))
        .unwrap();

    let updates = updates.lock().unwrap();
    assert_eq!(updates.first().map(|u| u.0), Some(PipelineStage::Loading));
    assert_eq!(updates.last().map(|u| u.0), Some(PipelineStage::Complete));
    assert!(updates.windows(2).all(|w| w[1].1 >= w[0].1 - 1e-4));
}

#[test]
fn test_duplicate_encounter_keeps_first_seen() {
    let mut df = SyntheticEncounters::new(40)
        .weight_missing_rate(0.0)
        .generate()
        .unwrap();
    let first_patient = df.column("patient_nbr").unwrap().i64().unwrap().get(0);

    // the second row repeats the first row's encounter id
    let mut ids: Vec<i64> = (1..=40).collect();
    ids[1] = 1;
    df.replace("encounter_id", Series::new("encounter_id".into(), ids))
        .unwrap();

    let result = run_on(df, fast_config());
    assert_eq!(result.dataset.height(), 39);

    let ids = result.dataset.column("encounter_id").unwrap().i64().unwrap();
    assert_eq!(ids.into_iter().filter(|id| *id == Some(1)).count(), 1);
    let patients = result.dataset.column("patient_nbr").unwrap().i64().unwrap();
    assert_eq!(patients.get(0), first_patient);
}

// ============================================================================
// Container Tests
// ============================================================================

#[test]
fn test_entirely_missing_categorical_becomes_unknown() {
    let mut df = SyntheticEncounters::new(50).generate().unwrap();
    df.replace("payer_code", Series::new("payer_code".into(), vec!["?"; 50]))
        .unwrap();

    let schema = SchemaConfig::default();
    let config = fast_config();
    let mut ctx = RunContext::detached();
    let mut container = DatasetContainer::new();
    container
        .load(&FrameSource::new("synthetic", df), &mut ctx)
        .unwrap();
    container
        .clean(&EncounterCleaner::new(schema.clone()), &mut ctx)
        .unwrap();
    container
        .apply(&TargetDeriver::new(schema), &mut ctx)
        .unwrap();
    container
        .apply(&MissingValueImputer::from_config(&config), &mut ctx)
        .unwrap();

    let payer = container.processed().unwrap().column("payer_code").unwrap();
    assert!(payer.str().unwrap().into_iter().all(|v| v == Some("Unknown")));

    match container.report().get("missing_value_handling") {
        Some(StageRecord::MissingValueHandling(report)) => {
            let payer = report
                .strategies
                .iter()
                .find(|s| s.column == "payer_code")
                .unwrap();
            assert_eq!(payer.strategy, ImputationStrategy::UnknownMarker);
        }
        other => panic!("unexpected imputation record: {:?}", other),
    }
    assert!(ctx.log().warnings().any(|w| w.message.contains("payer_code")));
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_stages_before_load_are_state_errors() {
    let mut ctx = RunContext::detached();
    let mut container = DatasetContainer::new();

    let err = container
        .clean(&EncounterCleaner::new(SchemaConfig::default()), &mut ctx)
        .unwrap_err();
    assert!(err.is_state_error());
    assert_eq!(err.error_code(), "STATE_ERROR");
    assert!(container.report().is_empty());
}

#[test]
fn test_missing_outcome_is_schema_error() {
    let df = SyntheticEncounters::new(30)
        .generate()
        .unwrap()
        .drop("readmitted")
        .unwrap();

    let err = Pipeline::builder()
        .config(fast_config())
        .build()
        .unwrap()
        .run(&FrameSource::new("no outcome", df))
        .unwrap_err();

    assert!(err.is_schema_error());
    assert_eq!(err.error_code(), "SCHEMA_ERROR");
    assert!(err.to_string().contains("readmitted"));
}

#[test]
fn test_missing_file_is_load_error() {
    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(&CsvSource::new("/definitely/not/here/diabetic_data.csv"))
        .unwrap_err();

    assert!(err.is_load_error());
    assert!(err.to_string().contains("loading"));
}

// ============================================================================
// File Round Trip
// ============================================================================

#[test]
fn test_csv_input_to_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("encounters.csv");

    let mut df = SyntheticEncounters::new(200).generate().unwrap();
    let mut file = std::fs::File::create(&input).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();

    let result = Pipeline::builder()
        .config(fast_config())
        .build()
        .unwrap()
        .run(&CsvSource::new(&input))
        .unwrap();
    assert_eq!(result.dataset.height(), 190);

    let exporter = DatasetExporter::new(dir.path().join("out"));
    let artifacts = ReportGenerator::write_artifacts(
        &exporter,
        &result,
        &[ExportFormat::Csv, ExportFormat::Json],
    )
    .unwrap();

    assert_eq!(artifacts.datasets.len(), 2);
    for path in artifacts.datasets.values() {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let exported = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(artifacts.datasets[&ExportFormat::Csv].clone()))
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(exported.height(), 190);
    assert!(exported.column("readmitted_30_days").is_ok());
    // column names are lowercased on export
    assert!(exported.column("a1cresult_norm").is_ok());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&artifacts.validation_report).unwrap())
            .unwrap();
    assert_eq!(report["original"]["original_shape"][0], 200);
    assert_eq!(report["final_dataset"]["shape"][0], 190);
}
