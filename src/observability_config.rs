//! # Observability Configuration
//!
//! Environment-specific settings for structured logging.

use std::env;

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable multi-line output
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings for the current deployment
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Deployment name; `development` selects pretty output
    pub environment: String,
    /// Log level for the crate's own targets
    pub log_level: String,
    /// Explicit format override; `None` picks pretty in development and JSON elsewhere
    pub log_format: Option<LogFormat>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
        }
    }
}

impl ObservabilityConfig {
    /// Read `ENVIRONMENT`, `LOG_LEVEL` and `LOG_FORMAT`
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT")
                .ok()
                .and_then(|value| parse_log_format(&value)),
        }
    }

    /// `ENVIRONMENT=production`
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// `ENVIRONMENT=development`
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Format the fmt layer should use
    pub fn effective_format(&self) -> LogFormat {
        match self.log_format {
            Some(format) => format,
            None if self.is_development() => LogFormat::Pretty,
            None => LogFormat::Json,
        }
    }

    /// Reject unknown levels and blank environment names
    pub fn validate(&self) -> Result<(), String> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }
        if self.environment.trim().is_empty() {
            return Err("Environment name cannot be empty".to_string());
        }
        Ok(())
    }
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.trim().to_lowercase().as_str() {
        "pretty" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Ready-made settings for local runs and deployments
pub mod presets {
    use super::{LogFormat, ObservabilityConfig};

    /// Development configuration with verbose pretty output
    pub fn development() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            log_format: Some(LogFormat::Pretty),
        }
    }

    /// Production configuration with JSON output
    pub fn production() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "production".to_string(),
            log_level: "warn".to_string(),
            log_format: Some(LogFormat::Json),
        }
    }
}
