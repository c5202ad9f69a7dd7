//! # Recognizer Instance Manager Module
//!
//! Thread-safe cache of Tesseract instances. Initializing Tesseract costs hundreds of
//! milliseconds, so one instance per language/model/segmentation combination is created
//! on first use and shared afterwards.

use leptess::LepTess;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::ocr_config::{ModelType, OcrConfig, PageSegMode};
use crate::ocr_errors::RecognitionError;

/// Thread-safe pool of Tesseract instances
///
/// Instances are keyed by `languages:model:psm`. Each instance sits behind its own mutex
/// because Tesseract handles are not reentrant; callers holding different keys never
/// contend.
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, Arc<Mutex<LepTess>>>>,
}

impl OcrInstanceManager {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn instance_key(config: &OcrConfig, psm: PageSegMode) -> String {
        format!(
            "{}:{}:{}",
            config.languages,
            config.model_type.tessdata_dir(),
            psm.as_str()
        )
    }

    /// Get or create an instance for the configuration and segmentation mode
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::Initialization`] if Tesseract cannot load the
    /// requested languages or reject the segmentation mode.
    pub fn get_instance(
        &self,
        config: &OcrConfig,
        psm: PageSegMode,
    ) -> Result<Arc<Mutex<LepTess>>, RecognitionError> {
        let key = Self::instance_key(config, psm);

        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }

        info!(
            languages = %config.languages,
            model = %config.model_type.tessdata_dir(),
            psm = %psm.as_str(),
            "Creating new Tesseract instance"
        );

        let tessdata_path = Self::get_tessdata_path(config.model_type);

        let mut tess = LepTess::new(tessdata_path.as_deref(), &config.languages).map_err(|e| {
            RecognitionError::Initialization(format!("Failed to initialize Tesseract: {}", e))
        })?;

        tess.set_variable(leptess::Variable::TesseditPagesegMode, psm.as_str())
            .map_err(|e| {
                RecognitionError::Initialization(format!("Failed to set PSM mode: {}", e))
            })?;

        let instance = Arc::new(Mutex::new(tess));

        // Another thread may have raced us here; keep whichever landed first
        let mut instances = self.instances.lock();
        let stored = instances.entry(key).or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(stored))
    }

    /// Resolve the tessdata directory holding this model
    ///
    /// Falls back to Tesseract's compiled-in default when no model-specific directory exists.
    fn get_tessdata_path(model_type: ModelType) -> Option<String> {
        let dir = model_type.tessdata_dir();
        let possible_paths = [
            format!("/usr/share/tesseract-ocr/5/{dir}"),
            format!("/usr/share/tesseract-ocr/4.00/{dir}"),
            format!("/usr/share/{dir}"),
            format!("/usr/local/share/{dir}"),
        ];

        if let Some(path) = possible_paths
            .into_iter()
            .find(|path| std::path::Path::new(path).exists())
        {
            info!("Using tessdata path: {}", path);
            return Some(path);
        }

        info!(
            "No specific tessdata path found for model type {:?}, using default",
            model_type
        );
        None
    }

    /// Drop every cached instance
    pub fn clear(&self) {
        let mut instances = self.instances.lock();
        let count = instances.len();
        instances.clear();
        if count > 0 {
            info!("Cleared {count} Tesseract instances");
        }
    }

    /// Number of cached instances
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}
