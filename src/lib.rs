//! # Shift Table OCR
//!
//! Recovers the column layout of a photographed staff-shift table, recognizes each
//! header and duty cell independently and assembles a dated schedule.
//!
//! The recognizer is pluggable through [`ocr::WordRecognizer`]; a Tesseract-backed
//! implementation is available with the `tesseract` feature.

pub mod clustering;
pub mod config;
pub mod errors;
pub mod geometry;
#[cfg(feature = "tesseract")]
pub mod instance_manager;
pub mod layout;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod schedule;
#[cfg(feature = "tesseract")]
pub mod tesseract;

// Re-export types for easier access
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use ocr::{RecognizedText, WordRecognizer};
pub use pipeline::{ExtractionOutcome, NoTableReason, PipelineError, TableExtractor};
pub use schedule::{ScheduleDocument, ScheduleEntry};
