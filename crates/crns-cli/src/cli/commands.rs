use super::helpers::{load_config, read_json, write_json};
use super::CliError;
use crns_core::domain::{CalibrationSample, SiteMetadata, StageReport, TimeSeriesRecord};
use crns_core::modules::{CalibrationEngine, CorrectionPipeline, QualityControl, ThetaEngine};
use crns_core::numerics::beta_coefficient;
use serde::Serialize;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct MetadataArgs {
    /// Site metadata JSON path
    #[arg(long)]
    site: PathBuf,

    /// Updated site output path; the input file is overwritten when absent
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct CorrectArgs {
    /// Site metadata JSON path
    #[arg(long)]
    site: PathBuf,

    /// Hourly series JSON path
    #[arg(long)]
    series: PathBuf,

    /// Processing config JSON path; defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Corrected series output path
    #[arg(long)]
    output: PathBuf,

    /// Stage report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct CalibrateArgs {
    /// Site metadata JSON path
    #[arg(long)]
    site: PathBuf,

    /// Calibration sample JSON path
    #[arg(long)]
    samples: PathBuf,

    /// Hourly series JSON path (raw; corrections are applied first)
    #[arg(long)]
    series: PathBuf,

    /// Processing config JSON path; defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Updated site output path; the input file is overwritten when absent
    #[arg(long)]
    output_site: Option<PathBuf>,

    /// Calibration report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ProcessArgs {
    /// Site metadata JSON path (must carry a calibrated N0)
    #[arg(long)]
    site: PathBuf,

    /// Hourly series JSON path
    #[arg(long)]
    series: PathBuf,

    /// Processing config JSON path; defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Processed series output path
    #[arg(long)]
    output: PathBuf,

    /// Daily-resolution output path
    #[arg(long)]
    daily: Option<PathBuf>,

    /// Second N0 for the side-by-side comparison column
    #[arg(long)]
    alt_n0: Option<f64>,

    /// Stage report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct ProcessReport {
    correction: StageReport,
    quality: StageReport,
    theta: StageReport,
}

pub(super) fn run_metadata_command(args: MetadataArgs) -> Result<i32, CliError> {
    let mut site: SiteMetadata = read_json(&args.site, "site metadata")?;
    let constants = beta_coefficient(site.latitude, site.elevation, site.cutoff_rigidity);
    site.beta_coefficient = Some(constants.beta);
    site.reference_pressure = Some(constants.reference_pressure);

    let output = args.output.unwrap_or(args.site);
    write_json(&output, &site, "site metadata")?;
    tracing::info!(
        site = %site.site_label(),
        beta = constants.beta,
        reference_pressure = constants.reference_pressure,
        "site constants derived"
    );
    println!(
        "Site {}: beta {:.6}, reference pressure {:.2} mb.",
        site.site_label(),
        constants.beta,
        constants.reference_pressure
    );
    Ok(0)
}

pub(super) fn run_correct_command(args: CorrectArgs) -> Result<i32, CliError> {
    let site: SiteMetadata = read_json(&args.site, "site metadata")?;
    let mut series: Vec<TimeSeriesRecord> = read_json(&args.series, "series")?;
    let config = load_config(args.config.as_ref())?;

    let pipeline = CorrectionPipeline::new(&config, &site).map_err(CliError::Compute)?;
    let report = pipeline.apply(&mut series).map_err(CliError::Compute)?;
    tracing::info!(
        processed = report.processed,
        skipped = report.skipped.len(),
        "correction stage complete"
    );
    for skip in &report.skipped {
        tracing::warn!(timestamp = %skip.timestamp, reason = %skip.reason, "row skipped");
    }

    write_json(&args.output, &series, "corrected series")?;
    if let Some(path) = &args.report {
        write_json(path, &report, "stage report")?;
    }
    println!(
        "Corrected {} rows ({} skipped) for site {}.",
        report.processed,
        report.skipped.len(),
        site.site_label()
    );
    Ok(0)
}

pub(super) fn run_calibrate_command(args: CalibrateArgs) -> Result<i32, CliError> {
    let mut site: SiteMetadata = read_json(&args.site, "site metadata")?;
    let samples: Vec<CalibrationSample> = read_json(&args.samples, "calibration samples")?;
    let mut series: Vec<TimeSeriesRecord> = read_json(&args.series, "series")?;
    let config = load_config(args.config.as_ref())?;

    let pipeline = CorrectionPipeline::new(&config, &site).map_err(CliError::Compute)?;
    pipeline.apply(&mut series).map_err(CliError::Compute)?;

    let engine = CalibrationEngine::new(&config);
    let outcome = engine
        .calibrate(&mut site, &samples, &series)
        .map_err(CliError::Compute)?;
    tracing::info!(
        site = %site.site_label(),
        n0 = outcome.n0,
        days = outcome.days.len(),
        "calibration complete"
    );

    let output = args.output_site.unwrap_or(args.site);
    write_json(&output, &site, "site metadata")?;
    if let Some(path) = &args.report {
        write_json(path, &outcome, "calibration report")?;
    }
    println!(
        "Calibrated site {}: N0 = {} (summed relative error {:.6}).",
        site.site_label(),
        outcome.n0,
        outcome.summed_relative_error
    );
    Ok(0)
}

pub(super) fn run_process_command(args: ProcessArgs) -> Result<i32, CliError> {
    let site: SiteMetadata = read_json(&args.site, "site metadata")?;
    let mut series: Vec<TimeSeriesRecord> = read_json(&args.series, "series")?;
    let config = load_config(args.config.as_ref())?;

    let pipeline = CorrectionPipeline::new(&config, &site).map_err(CliError::Compute)?;
    let correction = pipeline.apply(&mut series).map_err(CliError::Compute)?;

    let control = QualityControl::new(&config, &site).map_err(CliError::Compute)?;
    let quality = control.apply(&mut series).map_err(CliError::Compute)?;

    let engine = ThetaEngine::new(&config, &site, args.alt_n0).map_err(CliError::Compute)?;
    let theta = engine.apply(&mut series).map_err(CliError::Compute)?;
    tracing::info!(
        corrected = correction.processed,
        flagged = quality.skipped.len(),
        inverted = theta.processed,
        "processing pipeline complete"
    );

    for skip in &quality.skipped {
        tracing::warn!(timestamp = %skip.timestamp, reason = %skip.reason, "row flagged");
    }

    write_json(&args.output, &series, "processed series")?;
    // An explicit --daily path wins; the config toggle alone writes next to
    // the hourly output.
    let daily_path = args.daily.clone().or_else(|| {
        config
            .daily_aggregation
            .then(|| args.output.with_extension("daily.json"))
    });
    if let Some(path) = daily_path {
        let daily = engine.aggregate_daily(&series);
        write_json(&path, &daily, "daily series")?;
    }
    let inverted = theta.processed;
    let flagged = quality.skipped.len();
    if let Some(path) = &args.report {
        let report = ProcessReport {
            correction,
            quality,
            theta,
        };
        write_json(path, &report, "stage report")?;
    }
    println!(
        "Processed {} rows for site {} ({} corrected, {} flagged).",
        series.len(),
        site.site_label(),
        inverted,
        flagged
    );
    Ok(0)
}
