//! # Recognition Error Types Module
//!
//! Error types produced by word recognizer adapters and by the recognition stage of the
//! pipeline.

/// Custom error types for text recognition operations
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// Recognition engine initialization errors
    Initialization(String),
    /// Image could not be handed to the engine
    ImageLoad(String),
    /// Text extraction errors
    Extraction(String),
    /// Timeout errors
    Timeout(String),
    /// The caller abandoned the run
    Cancelled,
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionError::Initialization(msg) => {
                write!(f, "[OCR_INIT] Recognition engine initialization failed: {}", msg)
            }
            RecognitionError::ImageLoad(msg) => {
                write!(f, "[IMAGE_LOAD] Failed to load image for recognition: {}", msg)
            }
            RecognitionError::Extraction(msg) => {
                write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg)
            }
            RecognitionError::Timeout(msg) => {
                write!(f, "[OCR_TIMEOUT] Recognition timed out: {}", msg)
            }
            RecognitionError::Cancelled => write!(f, "[OCR_CANCELLED] Recognition was cancelled"),
        }
    }
}

impl std::error::Error for RecognitionError {}

impl From<anyhow::Error> for RecognitionError {
    fn from(err: anyhow::Error) -> Self {
        RecognitionError::Extraction(err.to_string())
    }
}

impl From<image::ImageError> for RecognitionError {
    fn from(err: image::ImageError) -> Self {
        RecognitionError::ImageLoad(err.to_string())
    }
}
