//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Spans for pipeline runs and recognizer calls
//! - Metric recording through the `metrics` facade (no exporter is installed here;
//!   a host application can install any recorder it likes)

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::layout::Strategy;
use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("shift_table_ocr={}", config.log_level.to_lowercase()).parse()?)
        .add_directive(format!("layout={}", config.log_level.to_lowercase()).parse()?);

    let installed = match config.effective_format() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for one end-to-end extraction
pub fn pipeline_span(image_width: u32, image_height: u32) -> tracing::Span {
    tracing::info_span!(
        "table_extraction",
        image_width = image_width,
        image_height = image_height,
        component = "pipeline"
    )
}

/// Create a span for recognizer calls
pub fn recognition_span(operation: &str) -> tracing::Span {
    tracing::info_span!("recognition", operation = operation, component = "ocr")
}

/// Record the outcome of one pipeline run
pub fn record_pipeline_metrics(outcome: &'static str, duration: std::time::Duration) {
    metrics::counter!("table_extractions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("table_extraction_duration_seconds").record(duration.as_secs_f64());
}

/// Record one whole-image recognition attempt series
pub fn record_recognition_metrics(success: bool, duration: std::time::Duration, attempts: u32) {
    metrics::counter!("recognition_operations_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("recognition_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("recognition_retry_attempts").record(f64::from(attempts));
}

/// Record per-cell recognition results for one band
pub fn record_cell_metrics(band: &'static str, recognized: usize, unreadable: usize) {
    metrics::counter!("cells_recognized_total", "band" => band).increment(recognized as u64);
    metrics::counter!("cells_unreadable_total", "band" => band).increment(unreadable as u64);
}

/// Record the cell count a strategy produced
pub fn record_boundary_metrics(strategy: Strategy, cells: usize) {
    metrics::histogram!("boundary_cells", "strategy" => strategy.as_str()).record(cells as f64);
}
