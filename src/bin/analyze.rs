use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use serde::Serialize;
use tracing::info;

use sales_forecast_api::{
    config::{self, ReportMode},
    services::{AnalysisService, ReportService},
};

#[derive(Parser)]
#[command(
    name = "sales-analyze",
    about = "Run the sales analysis pipeline on a local spreadsheet",
    version
)]
struct Cli {
    /// Spreadsheet (.xls or .xlsx) with `fecha` and `total` columns
    #[arg(short, long)]
    file: PathBuf,

    /// Directory for the PNG charts (defaults to the configured one)
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// Directory for the PDF report (defaults to the configured one)
    #[arg(long)]
    reports_dir: Option<PathBuf>,

    /// Seed for the ARIMA order search, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Write the one-page summary report instead of the full report"
    )]
    summary_only: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    if let Some(dir) = cli.images_dir {
        config.images_dir = dir;
    }
    if let Some(dir) = cli.reports_dir {
        config.reports_dir = dir;
    }
    if cli.seed.is_some() {
        config.analysis.search_seed = cli.seed;
    }
    if cli.summary_only {
        config.report.mode = ReportMode::SummaryOnly;
    }
    if !cli.file.is_file() {
        bail!("spreadsheet {} does not exist", cli.file.display());
    }
    config
        .ensure_directories()
        .context("failed to create output directories")?;

    let config = Arc::new(config);
    let reports = Arc::new(ReportService::new(&config));
    let analysis = AnalysisService::new(config.clone(), reports.clone());

    let report = analysis
        .analyze_file(&cli.file)
        .with_context(|| format!("analysis of {} failed", cli.file.display()))?;
    info!(
        report = %reports.reports_dir().join(&report.pdf_filename).display(),
        "analysis complete"
    );

    print_json(&report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
