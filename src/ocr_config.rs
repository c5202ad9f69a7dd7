//! # Recognition Configuration Module
//!
//! This module defines configuration structures for word recognition,
//! including recovery settings and Tesseract page segmentation parameters.

use crate::errors::{AppError, AppResult};

/// Japanese for the duty glyphs, English for the digits and slashes of the dates
pub const DEFAULT_LANGUAGES: &str = "jpn+eng";

/// Retry and timeout policy for recognizer calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Number of retries after the first whole-image attempt
    pub max_retries: u32,
    /// First backoff delay, doubled on every further retry
    pub base_retry_delay_ms: u64,
    /// Backoff ceiling before jitter
    pub max_retry_delay_ms: u64,
    /// Timeout for a whole-image recognition call in seconds
    pub operation_timeout_secs: u64,
    /// Timeout for a single cell recognition call in seconds
    pub cell_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: 30,
            cell_timeout_secs: 10,
        }
    }
}

impl RecoveryConfig {
    /// Reject zero delays and timeouts
    pub fn validate(&self) -> AppResult<()> {
        if self.base_retry_delay_ms == 0 {
            return Err(AppError::Config(
                "base_retry_delay_ms must be positive".to_string(),
            ));
        }
        if self.max_retry_delay_ms < self.base_retry_delay_ms {
            return Err(AppError::Config(format!(
                "max_retry_delay_ms {} is below base_retry_delay_ms {}",
                self.max_retry_delay_ms, self.base_retry_delay_ms
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be positive".to_string(),
            ));
        }
        if self.cell_timeout_secs == 0 {
            return Err(AppError::Config(
                "cell_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tesseract page segmentation modes used by the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageSegMode {
    /// Automatic layout analysis
    #[default]
    Auto = 3,
    /// One column of variable-size text
    SingleColumn = 4,
    /// One vertical block, for tategaki cells
    SingleBlockVert = 5,
    /// One uniform block, the default for cells
    SingleBlock = 6,
    /// One text line
    SingleLine = 7,
    /// One word
    SingleWord = 8,
    /// Scattered words, the default for whole photographs
    SparseText = 11,
}

impl PageSegMode {
    /// Numeric value as Tesseract expects it in `tessedit_pageseg_mode`
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlockVert => "5",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::SparseText => "11",
        }
    }

    /// Parse the numeric Tesseract value, as used in environment overrides
    pub fn from_number(value: &str) -> Option<Self> {
        match value.trim() {
            "3" => Some(PageSegMode::Auto),
            "4" => Some(PageSegMode::SingleColumn),
            "5" => Some(PageSegMode::SingleBlockVert),
            "6" => Some(PageSegMode::SingleBlock),
            "7" => Some(PageSegMode::SingleLine),
            "8" => Some(PageSegMode::SingleWord),
            "11" => Some(PageSegMode::SparseText),
            _ => None,
        }
    }
}

/// Which trained data set to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelType {
    /// `tessdata_fast` integer models
    #[default]
    Fast,
    /// `tessdata_best` float models
    Best,
}

impl ModelType {
    /// Directory name the trained data is installed under
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }
}

/// Configuration structure for word recognition
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language codes (e.g., "jpn", "jpn+eng")
    pub languages: String,
    /// Trained data set
    pub model_type: ModelType,
    /// Segmentation used for the whole photograph (word boxes)
    pub page_psm: PageSegMode,
    /// Segmentation used for a single padded cell
    pub cell_psm: PageSegMode,
    /// Retries and timeouts
    pub recovery: RecoveryConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            page_psm: PageSegMode::SparseText,
            cell_psm: PageSegMode::SingleBlock,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl OcrConfig {
    /// Validate languages and recovery settings
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }
        if self.languages.split('+').any(|lang| lang.trim().is_empty()) {
            return Err(AppError::Config(format!(
                "languages contains an empty entry: '{}'",
                self.languages
            )));
        }

        self.recovery.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unused_assignments)]
    fn test_recovery_config_validation() {
        let mut config = RecoveryConfig::default();

        assert!(config.validate().is_ok());

        // Zero retries is allowed, the first attempt always runs
        config.max_retries = 0;
        assert!(config.validate().is_ok());

        config.base_retry_delay_ms = 0;
        assert!(config.validate().is_err());
        config.base_retry_delay_ms = 500;

        config.max_retry_delay_ms = 100;
        assert!(config.validate().is_err());
        config.max_retry_delay_ms = 5000;

        config.operation_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.operation_timeout_secs = 30;

        config.cell_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ocr_config_defaults() {
        let config = OcrConfig::default();
        assert_eq!(config.languages, "jpn+eng");
        assert_eq!(config.page_psm, PageSegMode::SparseText);
        assert_eq!(config.cell_psm, PageSegMode::SingleBlock);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ocr_config_rejects_bad_languages() {
        let config = OcrConfig {
            languages: "   ".to_string(),
            ..OcrConfig::default()
        };
        assert!(config.validate().is_err());

        let config = OcrConfig {
            languages: "jpn++eng".to_string(),
            ..OcrConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_seg_mode_round_trip_through_number() {
        for psm in [
            PageSegMode::Auto,
            PageSegMode::SingleBlock,
            PageSegMode::SingleLine,
            PageSegMode::SparseText,
        ] {
            assert_eq!(PageSegMode::from_number(psm.as_str()), Some(psm));
        }
        assert_eq!(PageSegMode::from_number("42"), None);
    }

    #[test]
    fn test_model_type_tessdata_dir() {
        assert_eq!(ModelType::Fast.tessdata_dir(), "tessdata_fast");
        assert_eq!(ModelType::Best.tessdata_dir(), "tessdata_best");
        assert_eq!(ModelType::default(), ModelType::Fast);
    }
}
