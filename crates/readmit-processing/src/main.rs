//! CLI entry point for the readmission dataset pipeline.

use anyhow::{Result, anyhow};
use clap::{ArgGroup, Parser, ValueEnum};
use dotenv::dotenv;
use readmit_processing::reporting::ArtifactPaths;
use readmit_processing::{
    CsvSource, DatasetExporter, ExportFormat, FrameSource, Pipeline, PipelineConfig,
    PipelineResult, ReportGenerator, SyntheticEncounters, TabularSource,
};
use std::path::Path;
use tracing::{error, info, warn};

/// CLI-compatible export format enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliExportFormat {
    /// Comma-separated values
    Csv,
    /// A JSON array of records
    Json,
    /// Columnar Parquet file
    Parquet,
}

impl From<CliExportFormat> for ExportFormat {
    fn from(cli: CliExportFormat) -> Self {
        match cli {
            CliExportFormat::Csv => ExportFormat::Csv,
            CliExportFormat::Json => ExportFormat::Json,
            CliExportFormat::Parquet => ExportFormat::Parquet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Hospital readmission dataset pipeline",
    long_about = "Turns raw diabetes encounter records into an ML-ready dataset with a \
                  30-day readmission label, a feature importance ranking and a \
                  validation report.\n\n\
                  EXAMPLES:\n  \
                  # Process a dataset with default settings\n  \
                  readmit-processing -i diabetic_data.csv\n\n  \
                  # Write every export format to a custom directory\n  \
                  readmit-processing -i diabetic_data.csv -o results/ --formats csv,json,parquet\n\n  \
                  # Run on 5000 synthetic encounters without outlier capping\n  \
                  readmit-processing --sample-rows 5000 --no-outlier-capping\n\n  \
                  # Machine-readable report\n  \
                  readmit-processing -i diabetic_data.csv --json | jq .processing_summary"
)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "sample_rows"])))]
struct Args {
    /// Path to the encounter CSV file
    #[arg(short, long)]
    input: Option<String>,

    /// Generate this many synthetic encounters instead of reading a file
    #[arg(long)]
    sample_rows: Option<usize>,

    /// Output directory for the processed dataset and reports
    #[arg(short, long, default_value = "./processed_data")]
    output: String,

    /// Formats the processed dataset is written in
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["csv", "json"])]
    formats: Vec<CliExportFormat>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Neighbors used by KNN imputation
    #[arg(long)]
    knn_neighbors: Option<usize>,

    /// Missing share (0.0 - 1.0) below which numeric columns use the median
    #[arg(long)]
    missing_share_cutoff: Option<f64>,

    /// Most distinct values a column may have and still be one-hot encoded
    #[arg(long)]
    cardinality_cutoff: Option<usize>,

    /// Width of the IQR fences used for outlier capping
    #[arg(long)]
    iqr_multiplier: Option<f64>,

    /// Row count considered fully adequate by the quality score
    #[arg(long)]
    target_rows: Option<usize>,

    /// Trees in the importance forest
    #[arg(long)]
    forest_trees: Option<usize>,

    /// Depth limit of the importance trees (unlimited by default)
    #[arg(long)]
    forest_max_depth: Option<usize>,

    /// Neighbors used by the mutual information estimator
    #[arg(long)]
    mi_neighbors: Option<usize>,

    /// Seed for every randomized step
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the outlier capping stage
    #[arg(long)]
    no_outlier_capping: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the JSON report to stdout instead of the human-readable summary
    ///
    /// Disables all progress logs. Artifacts are still written.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled so stdout
/// only carries the report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = build_config(&args)?;
    let source = build_source(&args, &config)?;

    if !Path::new(&args.output).exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output);
    }

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    info!("{}", "=".repeat(80));
    info!("Starting readmission pipeline on {}", source.describe());
    info!("{}", "=".repeat(80));

    let result = pipeline.run(&*source).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed [{}]: {}", e.error_code(), e)
    })?;

    let formats: Vec<ExportFormat> = args.formats.iter().map(|f| (*f).into()).collect();
    let exporter = DatasetExporter::new(&args.output);
    let artifacts = ReportGenerator::write_artifacts(&exporter, &result, &formats)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.report)?);
        return Ok(());
    }

    print_human_readable_summary(&result, &artifacts);
    Ok(())
}

/// Start from the config file (or defaults) and apply every flag given.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(n) = args.knn_neighbors {
        config.knn_neighbors = n;
    }
    if let Some(cutoff) = args.missing_share_cutoff {
        config.missing_share_cutoff = cutoff;
    }
    if let Some(cutoff) = args.cardinality_cutoff {
        config.cardinality_cutoff = cutoff;
    }
    if let Some(multiplier) = args.iqr_multiplier {
        config.iqr_multiplier = multiplier;
    }
    if let Some(rows) = args.target_rows {
        config.target_rows = rows;
    }
    if let Some(trees) = args.forest_trees {
        config.forest_trees = trees;
    }
    if args.forest_max_depth.is_some() {
        config.forest_max_depth = args.forest_max_depth;
    }
    if let Some(n) = args.mi_neighbors {
        config.mi_neighbors = n;
    }
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }
    if args.no_outlier_capping {
        config.enable_outlier_capping = false;
    }

    config.validate()?;
    Ok(config)
}

fn build_source(args: &Args, config: &PipelineConfig) -> Result<Box<dyn TabularSource>> {
    if let Some(rows) = args.sample_rows {
        info!("Generating {} synthetic encounters", rows);
        let df = SyntheticEncounters::new(rows)
            .seed(config.random_seed)
            .generate()?;
        return Ok(Box::new(FrameSource::new(
            format!("synthetic ({} rows)", rows),
            df,
        )));
    }

    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("Either --input or --sample-rows is required"))?;
    if !Path::new(input).exists() {
        return Err(anyhow!("Input file not found: {}", input));
    }
    Ok(Box::new(CsvSource::new(input)))
}

/// Print a human-readable summary of the run.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(result: &PipelineResult, artifacts: &ArtifactPaths) {
    let (rows, columns) = result.dataset.shape();
    let quality = &result.quality;

    println!();
    println!("{}", "=".repeat(80));
    println!("PROCESSING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Run: {} ({}ms)", result.run_id, result.duration_ms);
    println!("Final dataset: {} rows x {} columns", rows, columns);
    println!("Steps recorded: {}", result.report.keys().join(", "));
    println!();

    println!("Data Quality Score: {:.1}/100", quality.overall);
    println!("  Completeness:   {:.1}", quality.completeness);
    match quality.class_balance {
        Some(balance) => println!("  Class balance:  {:.1}", balance),
        None => println!("  Class balance:  n/a"),
    }
    println!("  Size adequacy:  {:.1}", quality.size_adequacy);
    println!();

    if !result.feature_importance.is_empty() {
        println!("Top Features:");
        for (rank, row) in result.feature_importance.top(10).iter().enumerate() {
            println!(
                "  {:>2}. {:<40} {:.4}",
                rank + 1,
                row.feature,
                row.combined_score
            );
        }
        println!();
    }

    let warnings: Vec<_> = result.log.warnings().collect();
    if !warnings.is_empty() {
        println!("Warnings:");
        for entry in warnings {
            println!("  ! [{}] {}", entry.stage, entry.message);
        }
        println!();
    }

    println!("Artifacts:");
    for (format, path) in &artifacts.datasets {
        println!("  {:<8} {}", format.extension(), path.display());
    }
    println!("  {:<8} {}", "ranking", artifacts.feature_importance.display());
    println!("  {:<8} {}", "report", artifacts.validation_report.display());
    println!();

    if result.quality.overall < 50.0 {
        warn!("Data quality score is below 50; review the validation report");
    }

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
