//! # Engine Configuration
//!
//! Layout tunables, recognition settings, pipeline orchestration and logging, grouped in
//! one [`AppConfig`]. Every section has working defaults; `from_env` overrides a subset
//! from environment variables and `validate` checks ranges before a run.

use crate::errors::{AppError, AppResult};
use crate::geometry::Band;
use crate::layout::boundaries::BoundaryOptions;
use crate::layout::projection::min_cell_width;
use crate::layout::{BodySelection, StrategyChoice};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::{ModelType, OcrConfig, PageSegMode};
use std::env;

/// Layout recovery tunables
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Minimum cell width as a multiple of the band height
    pub min_cell_factor: f64,
    /// Lower bound of the minimum cell width in pixels
    pub min_cell_floor: i32,
    /// Strategy tunables; `min_cell_width` and `expected_columns` are filled per band
    pub boundaries: BoundaryOptions,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_cell_factor: 0.9,
            min_cell_floor: 12,
            boundaries: BoundaryOptions::default(),
        }
    }
}

impl LayoutConfig {
    /// Boundary options for one band
    pub fn boundary_options(&self, band: &Band, expected_columns: Option<usize>) -> BoundaryOptions {
        BoundaryOptions {
            min_cell_width: min_cell_width(band, self.min_cell_factor, self.min_cell_floor),
            expected_columns,
            ..self.boundaries.clone()
        }
    }

    /// Validate layout configuration
    pub fn validate(&self) -> AppResult<()> {
        if !(self.min_cell_factor > 0.0 && self.min_cell_factor.is_finite()) {
            return Err(AppError::Config(format!(
                "min_cell_factor must be positive, got {}",
                self.min_cell_factor
            )));
        }
        if self.min_cell_floor <= 0 {
            return Err(AppError::Config(
                "min_cell_floor must be greater than 0".to_string(),
            ));
        }

        let valley = &self.boundaries.valley;
        if !(valley.depth_factor > 0.0 && valley.depth_factor <= 1.0) {
            return Err(AppError::Config(format!(
                "valley depth_factor must be in (0, 1], got {}",
                valley.depth_factor
            )));
        }
        if !(0.0..=1.0).contains(&valley.prominence_ratio) {
            return Err(AppError::Config(format!(
                "valley prominence_ratio must be in [0, 1], got {}",
                valley.prominence_ratio
            )));
        }

        let robust = &self.boundaries.robust;
        if !(0.0..=1.0).contains(&robust.min_prominence) {
            return Err(AppError::Config(format!(
                "robust min_prominence must be in [0, 1], got {}",
                robust.min_prominence
            )));
        }
        if robust.min_radius <= 0 {
            return Err(AppError::Config(
                "robust min_radius must be greater than 0".to_string(),
            ));
        }
        if robust.width_filter.is_some_and(|factor| factor <= 0.0) {
            return Err(AppError::Config(
                "robust width_filter must be positive when set".to_string(),
            ));
        }

        let adaptive = &self.boundaries.adaptive;
        if adaptive.min_threshold <= 0.0 || adaptive.mad_factor < 0.0 {
            return Err(AppError::Config(format!(
                "adaptive threshold parameters out of range: min_threshold={}, mad_factor={}",
                adaptive.min_threshold, adaptive.mad_factor
            )));
        }
        if adaptive.background_char_factor <= 0 || adaptive.background_width_divisor <= 0 {
            return Err(AppError::Config(
                "adaptive background radius parameters must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.boundaries.gap_run.tolerance) {
            return Err(AppError::Config(format!(
                "gap_run tolerance must be in [0, 1), got {}",
                self.boundaries.gap_run.tolerance
            )));
        }

        Ok(())
    }
}

/// Pipeline orchestration settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of cells recognized at the same time
    pub cell_concurrency: usize,
    /// How the boundary candidate is chosen
    pub strategy: StrategyChoice,
    /// Which words form the body band
    pub body_selection: BodySelection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cell_concurrency: 4,
            strategy: StrategyChoice::Auto,
            body_selection: BodySelection::AllBelowHeader,
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.cell_concurrency == 0 {
            return Err(AppError::Config(
                "cell_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.cell_concurrency > 64 {
            return Err(AppError::Config(
                "cell_concurrency cannot be greater than 64".to_string(),
            ));
        }
        Ok(())
    }
}

/// All settings of one extractor
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Layout recovery configuration
    pub layout: LayoutConfig,
    /// Word recognition configuration
    pub ocr: OcrConfig,
    /// Pipeline configuration
    pub pipeline: PipelineConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// Parse an optional environment variable, keeping `default` when unset
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", key, value))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Recognition
        config.ocr.languages =
            env::var("OCR_LANGUAGES").unwrap_or_else(|_| config.ocr.languages.clone());
        config.ocr.model_type = match env::var("OCR_MODEL_TYPE")
            .unwrap_or_else(|_| "fast".to_string())
            .to_lowercase()
            .as_str()
        {
            "fast" => ModelType::Fast,
            "best" => ModelType::Best,
            other => {
                return Err(AppError::Config(format!(
                    "OCR_MODEL_TYPE must be 'fast' or 'best', got '{}'",
                    other
                )))
            }
        };
        if let Ok(value) = env::var("OCR_PAGE_PSM") {
            config.ocr.page_psm = PageSegMode::from_number(&value).ok_or_else(|| {
                AppError::Config(format!("OCR_PAGE_PSM is not a supported mode: '{}'", value))
            })?;
        }
        if let Ok(value) = env::var("OCR_CELL_PSM") {
            config.ocr.cell_psm = PageSegMode::from_number(&value).ok_or_else(|| {
                AppError::Config(format!("OCR_CELL_PSM is not a supported mode: '{}'", value))
            })?;
        }
        config.ocr.recovery.max_retries =
            env_or("OCR_MAX_RETRIES", config.ocr.recovery.max_retries)?;
        config.ocr.recovery.operation_timeout_secs =
            env_or("OCR_TIMEOUT_SECS", config.ocr.recovery.operation_timeout_secs)?;
        config.ocr.recovery.cell_timeout_secs =
            env_or("OCR_CELL_TIMEOUT_SECS", config.ocr.recovery.cell_timeout_secs)?;

        // Layout
        config.layout.min_cell_factor = env_or("MIN_CELL_FACTOR", config.layout.min_cell_factor)?;
        config.layout.min_cell_floor = env_or("MIN_CELL_FLOOR_PX", config.layout.min_cell_floor)?;
        config.layout.boundaries.valley.depth_factor = env_or(
            "VALLEY_DEPTH_FACTOR",
            config.layout.boundaries.valley.depth_factor,
        )?;

        // Pipeline
        config.pipeline.cell_concurrency =
            env_or("CELL_CONCURRENCY", config.pipeline.cell_concurrency)?;
        if let Ok(value) = env::var("BOUNDARY_STRATEGY") {
            config.pipeline.strategy = value.parse().map_err(AppError::Config)?;
        }
        if let Ok(value) = env::var("BODY_ROW") {
            let index: usize = value.trim().parse().map_err(|_| {
                AppError::Config(format!("BODY_ROW must be a row index, got '{}'", value))
            })?;
            config.pipeline.body_selection = BodySelection::Row(index);
        }

        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.layout.validate()?;
        self.ocr.validate()?;
        self.pipeline.validate()?;
        self.observability.validate().map_err(AppError::Config)?;
        Ok(())
    }

    /// One-line summary for startup logs
    pub fn summary(&self) -> String {
        format!(
            "Configuration: ocr_languages={}, model={}, strategy={:?}, body={:?}, cell_concurrency={}, environment={}",
            self.ocr.languages,
            self.ocr.model_type.tessdata_dir(),
            self.pipeline.strategy,
            self.pipeline.body_selection,
            self.pipeline.cell_concurrency,
            self.observability.environment
        )
    }
}
