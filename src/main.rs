use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use shift_table_ocr::config::AppConfig;
use shift_table_ocr::errors::error_logging;
use shift_table_ocr::layout::{crop_band, render_boundary_overlay, StrategyChoice};
use shift_table_ocr::observability;
use shift_table_ocr::pipeline::{ExtractionOutcome, TableExtraction, TableExtractor};
use shift_table_ocr::schedule::{to_json, to_json_pretty};
use shift_table_ocr::tesseract::TesseractRecognizer;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Extract a dated duty schedule from a photographed shift table
#[derive(Parser, Debug)]
#[command(name = "shift-table-ocr", version, about)]
struct Args {
    /// Photograph of the shift table
    image: PathBuf,

    /// Year for the dates, defaults to the current year
    #[arg(long)]
    year: Option<i32>,

    /// Month used for bare day numbers, defaults to the current month
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// Boundary strategy: auto, valley, robust-peak, adaptive-high-pass or gap-run
    #[arg(long)]
    strategy: Option<StrategyChoice>,

    /// Write one boundary preview PNG per strategy into this directory
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Indent the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

/// Load configuration from the environment and apply command line overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().map_err(|e| {
        error_logging::log_config_error(&e, "environment", "load_config");
        anyhow::anyhow!("Configuration could not be loaded: {}", e)
    })?;

    if let Some(strategy) = args.strategy {
        config.pipeline.strategy = strategy;
    }

    config.validate().map_err(|e| {
        anyhow::anyhow!("Configuration validation failed: {}. Please check your environment.", e)
    })?;

    Ok(config)
}

/// Save the header band with each candidate's boundaries drawn on it
fn write_overlays(
    image: &image::DynamicImage,
    extraction: &TableExtraction,
    dir: &Path,
    stem: &str,
) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        error_logging::log_filesystem_error(&e, "create_overlay_dir", dir.to_str());
        anyhow::anyhow!("Failed to create overlay directory {}: {}", dir.display(), e)
    })?;

    let header = crop_band(image, &extraction.layout.header)?;
    for candidate in &extraction.layout.candidates {
        let overlay = render_boundary_overlay(&header, &candidate.boundaries);
        let path = dir.join(format!("{}-{}.png", stem, candidate.strategy));
        overlay
            .save(&path)
            .with_context(|| format!("Failed to write overlay {}", path.display()))?;
        info!(path = %path.display(), cells = candidate.cell_count(), "Overlay written");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;

    observability::init_tracing_with_config(&config.observability)?;
    info!("{}", config.summary());

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to open image {}", args.image.display()))?;

    let today = chrono::Local::now().date_naive();
    let year = args.year.unwrap_or_else(|| today.year());
    let month = args.month.unwrap_or_else(|| today.month());

    let recognizer = Arc::new(TesseractRecognizer::new(config.ocr.clone()));
    let extractor = TableExtractor::new(recognizer, config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling extraction");
            ctrl_c_token.cancel();
        }
    });

    let overlay_source = args.overlay_dir.as_ref().map(|_| image.clone());
    let outcome = extractor.extract(image, year, month, &cancel).await?;

    match outcome {
        ExtractionOutcome::Schedule(extraction) => {
            if let (Some(dir), Some(source)) = (&args.overlay_dir, &overlay_source) {
                let stem = args
                    .image
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("table");
                write_overlays(source, &extraction, dir, stem)?;
            }

            let json = if args.pretty {
                to_json_pretty(&extraction.document)?
            } else {
                to_json(&extraction.document)?
            };
            println!("{}", json);
        }
        ExtractionOutcome::NoTable(reason) => {
            anyhow::bail!("No table found in {}: {}", args.image.display(), reason);
        }
    }

    Ok(())
}
