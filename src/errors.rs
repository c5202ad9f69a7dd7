//! # Application Error Types
//!
//! This module defines common error types used throughout the shift table engine.
//! It provides structured error handling for configuration, layout, recognition and
//! serialization failures.

use std::fmt;

/// Errors surfaced outside the extraction pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Text recognition errors
    Recognition(String),
    /// Image decoding or encoding errors
    Image(String),
    /// JSON serialization errors
    Serialization(String),
    /// File system errors
    FileSystem(String),
    /// Anything else, usually wrapped from `anyhow`
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Recognition(msg) => write!(f, "[RECOGNITION] {}", msg),
            AppError::Image(msg) => write!(f, "[IMAGE] {}", msg),
            AppError::Serialization(msg) => write!(f, "[SERIALIZATION] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Image(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<crate::ocr_errors::RecognitionError> for AppError {
    fn from(err: crate::ocr_errors::RecognitionError) -> Self {
        AppError::Recognition(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the engine
pub mod error_logging {
    use tracing::{error, warn};

    /// Log whole-image recognition failures with image and timing context
    pub fn log_recognition_error(
        error: &impl std::fmt::Display,
        operation: &str,
        image_dimensions: Option<(u32, u32)>,
        attempt_count: Option<u32>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            image_dimensions = ?image_dimensions,
            attempt_count = ?attempt_count,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Text recognition failed"
        );
    }

    /// Log a single-cell recognition failure that was replaced by the sentinel
    pub fn log_cell_error(
        error: &impl std::fmt::Display,
        band: &str,
        column: usize,
        cell_dimensions: (u32, u32),
    ) {
        warn!(
            error = %error,
            band = %band,
            column = %column,
            cell_width = %cell_dimensions.0,
            cell_height = %cell_dimensions.1,
            "Cell recognition failed, substituting unreadable marker"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(error: &impl std::fmt::Display, operation: &str, path: Option<&str>) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            "File system operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display_prefixes() {
        assert_eq!(
            AppError::Config("bad".to_string()).to_string(),
            "[CONFIG] bad"
        );
        assert_eq!(
            AppError::FileSystem("missing".to_string()).to_string(),
            "[FILESYSTEM] missing"
        );
    }

    #[test]
    fn test_app_error_from_recognition_error() {
        let err: AppError =
            crate::ocr_errors::RecognitionError::Timeout("30s".to_string()).into();
        assert!(matches!(err, AppError::Recognition(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
