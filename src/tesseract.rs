//! # Tesseract Recognizer
//!
//! [`WordRecognizer`] backed by Tesseract through `leptess`. Whole photographs are read
//! with the page segmentation mode and reported as hOCR word boxes; cells are read with
//! the cell segmentation mode as plain text.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::instance_manager::OcrInstanceManager;
use crate::ocr::{parse_hocr_words, RecognizedText, WordRecognizer};
use crate::ocr_config::{OcrConfig, PageSegMode};
use crate::ocr_errors::RecognitionError;

/// Tesseract-backed recognizer sharing instances through an [`OcrInstanceManager`]
pub struct TesseractRecognizer {
    config: OcrConfig,
    instances: Arc<OcrInstanceManager>,
}

impl TesseractRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self::with_manager(config, Arc::new(OcrInstanceManager::new()))
    }

    pub fn with_manager(config: OcrConfig, instances: Arc<OcrInstanceManager>) -> Self {
        Self { config, instances }
    }

    fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RecognitionError> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    fn run(
        &self,
        image: &DynamicImage,
        psm: PageSegMode,
        with_words: bool,
    ) -> Result<RecognizedText, RecognitionError> {
        let png = Self::encode_png(image)?;
        let instance = self.instances.get_instance(&self.config, psm)?;
        let mut tess = instance.lock();

        tess.set_image_from_mem(&png).map_err(|e| {
            RecognitionError::ImageLoad(format!("Tesseract rejected the image: {}", e))
        })?;

        let words = if with_words {
            let hocr = tess.get_hocr_text(0).map_err(|e| {
                RecognitionError::Extraction(format!("Failed to read hOCR output: {}", e))
            })?;
            parse_hocr_words(&hocr)
        } else {
            Vec::new()
        };

        let text = tess.get_utf8_text().map_err(|e| {
            RecognitionError::Extraction(format!("Failed to extract text: {}", e))
        })?;

        debug!(
            psm = %psm.as_str(),
            chars = text.len(),
            words = words.len(),
            "Tesseract pass finished"
        );

        Ok(RecognizedText { text, words })
    }
}

impl WordRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText, RecognitionError> {
        self.run(image, self.config.page_psm, true)
    }

    fn recognize_cell(&self, image: &DynamicImage) -> Result<RecognizedText, RecognitionError> {
        self.run(image, self.config.cell_psm, false)
    }
}
