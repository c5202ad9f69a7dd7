//! # Table Extraction Pipeline
//!
//! Request-scoped orchestration of one photograph:
//!
//! 1. Whole-image recognition (retried, cancellable)
//! 2. Word cleanup and header/body band location
//! 3. Header projection and competing boundary strategies
//! 4. Candidate selection, band slicing and per-cell recognition
//! 5. Column join and schedule assembly
//!
//! Failing to find a table is a normal outcome ([`ExtractionOutcome::NoTable`]); only
//! whole-image recognition failures and cancellation are errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::geometry::{Band, Word};
use crate::layout::{
    bands::header_band_from_row, build_projection, crop_band, detect_all, locate_header_row,
    select_body_band, select_candidate, slice_by_boundaries, BoundaryCandidate, BoundaryList,
    HeaderRow, Projection, Strategy,
};
use crate::observability;
use crate::ocr::{clean_recognized_words, recognize_cells, recognize_page, CellText, WordRecognizer};
use crate::ocr_errors::RecognitionError;
use crate::schedule::{assemble_schedule, ScheduleDocument};

/// Errors that abort an extraction
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Whole-image recognition failed after all retries
    Recognition(RecognitionError),
    /// The caller cancelled the run
    Cancelled,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Recognition(err) => write!(f, "[PIPELINE] {}", err),
            PipelineError::Cancelled => write!(f, "[PIPELINE] Extraction was cancelled"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<RecognitionError> for PipelineError {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Recognition(other),
        }
    }
}

/// Why no table was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoTableReason {
    /// Recognition found no usable words
    NoWords,
    /// No words lie below the header row, or the requested body row does not exist
    NoBody,
    /// A band has no pixels inside the image
    EmptyBand,
    /// Boundary detection produced no usable columns
    NoColumns,
}

impl NoTableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoTableReason::NoWords => "no_words",
            NoTableReason::NoBody => "no_body",
            NoTableReason::EmptyBand => "empty_band",
            NoTableReason::NoColumns => "no_columns",
        }
    }
}

impl std::fmt::Display for NoTableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovered layout of one photograph
#[derive(Debug, Clone)]
pub struct LayoutAnalysis {
    pub header_row: HeaderRow,
    pub header: Band,
    pub body: Band,
    /// Header projection the candidates were computed from
    pub projection: Projection,
    /// One candidate per strategy, in [`Strategy::ALL`] order
    pub candidates: Vec<BoundaryCandidate>,
    pub selected: Strategy,
    /// Boundaries relative to the bands, shared by header and body
    pub boundaries: BoundaryList,
}

impl LayoutAnalysis {
    /// Expected column count read from the header tokens
    pub fn expected_columns(&self) -> Option<usize> {
        self.header_row.expected_columns()
    }
}

/// A recovered schedule together with the intermediate results
#[derive(Debug, Clone)]
pub struct TableExtraction {
    pub document: ScheduleDocument,
    pub layout: LayoutAnalysis,
    pub header_texts: Vec<CellText>,
    pub body_texts: Vec<CellText>,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Schedule(Box<TableExtraction>),
    NoTable(NoTableReason),
}

impl ExtractionOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            ExtractionOutcome::Schedule(_) => "schedule",
            ExtractionOutcome::NoTable(_) => "no_table",
        }
    }

    /// The document, if a table was found
    pub fn document(&self) -> Option<&ScheduleDocument> {
        match self {
            ExtractionOutcome::Schedule(extraction) => Some(&extraction.document),
            ExtractionOutcome::NoTable(_) => None,
        }
    }
}

/// Pair header and body texts by column index.
///
/// Columns present in only one band are dropped with a warning, so the result is never
/// longer than the shorter input.
pub fn join_columns(header: &[CellText], body: &[CellText]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(header.len().min(body.len()));

    for head in header {
        match body.iter().find(|cell| cell.column == head.column) {
            Some(duty) => pairs.push((head.text.clone(), duty.text.clone())),
            None => warn!(column = head.column, "Header column has no body cell, dropping"),
        }
    }
    for duty in body {
        if !header.iter().any(|cell| cell.column == duty.column) {
            warn!(column = duty.column, "Body column has no header cell, dropping");
        }
    }

    pairs
}

/// Runs the full extraction for one photograph at a time
pub struct TableExtractor {
    recognizer: Arc<dyn WordRecognizer>,
    config: AppConfig,
}

impl TableExtractor {
    /// Create an extractor after validating the configuration
    pub fn new(recognizer: Arc<dyn WordRecognizer>, config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { recognizer, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Recover the table layout from already recognized words.
    ///
    /// Pure and synchronous; no recognizer calls are made.
    pub fn analyze_layout(
        &self,
        image: &DynamicImage,
        words: &[Word],
    ) -> Result<LayoutAnalysis, NoTableReason> {
        let (width, height) = image.dimensions();

        let header_row = locate_header_row(words).ok_or(NoTableReason::NoWords)?;
        let header = header_band_from_row(&header_row, width);
        let body = select_body_band(
            words,
            &header,
            self.config.pipeline.body_selection,
            width,
            height,
        )
        .ok_or(NoTableReason::NoBody)?;

        let expected = header_row.expected_columns();
        let projection = build_projection(image, &header);
        if projection.raw.is_empty() {
            return Err(NoTableReason::EmptyBand);
        }

        let options = self.config.layout.boundary_options(&header, expected);
        let candidates = detect_all(&projection, &options);
        let selected = select_candidate(&candidates, self.config.pipeline.strategy, expected)
            .filter(|candidate| candidate.cell_count() > 0)
            .cloned()
            .ok_or(NoTableReason::NoColumns)?;

        info!(
            target: "layout",
            header_score = header_row.score,
            expected_columns = ?expected,
            strategy = %selected.strategy,
            cells = selected.cell_count(),
            "Layout recovered"
        );

        Ok(LayoutAnalysis {
            header_row,
            header,
            body,
            projection,
            candidates,
            selected: selected.strategy,
            boundaries: selected.boundaries,
        })
    }

    /// Extract the schedule from a photograph.
    ///
    /// `year` and `month` fill in what the header cells leave out.
    pub async fn extract(
        &self,
        image: DynamicImage,
        year: i32,
        month: u32,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let (width, height) = image.dimensions();
        let span = observability::pipeline_span(width, height);
        let start_time = Instant::now();

        let result = self
            .run(Arc::new(image), year, month, cancel)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(outcome) => outcome.metric_label(),
            Err(PipelineError::Cancelled) => "cancelled",
            Err(PipelineError::Recognition(_)) => "error",
        };
        observability::record_pipeline_metrics(outcome, start_time.elapsed());

        result
    }

    async fn run(
        &self,
        image: Arc<DynamicImage>,
        year: i32,
        month: u32,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let recovery = &self.config.ocr.recovery;

        let recognized =
            recognize_page(Arc::clone(&self.recognizer), Arc::clone(&image), recovery, cancel)
                .await?;
        let words = clean_recognized_words(recognized.words);
        debug!(words = words.len(), "Words ready for layout analysis");

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let layout = match self.analyze_layout(&image, &words) {
            Ok(layout) => layout,
            Err(reason) => {
                info!(reason = %reason, "No table found");
                return Ok(ExtractionOutcome::NoTable(reason));
            }
        };

        let (header_image, body_image) =
            match (crop_band(&image, &layout.header), crop_band(&image, &layout.body)) {
                (Ok(header), Ok(body)) => (header, body),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Band could not be cropped");
                    return Ok(ExtractionOutcome::NoTable(NoTableReason::EmptyBand));
                }
            };

        let header_cells = slice_by_boundaries(&header_image, &layout.boundaries);
        let body_cells = slice_by_boundaries(&body_image, &layout.boundaries);
        if header_cells.is_empty() || body_cells.is_empty() {
            return Ok(ExtractionOutcome::NoTable(NoTableReason::NoColumns));
        }

        // Shared by both bands so header calls abandoned on timeout still count
        let limiter = Arc::new(Semaphore::new(self.config.pipeline.cell_concurrency.max(1)));
        let cell_timeout = Duration::from_secs(recovery.cell_timeout_secs);

        let header_texts = recognize_cells(
            Arc::clone(&self.recognizer),
            header_cells,
            "header",
            Arc::clone(&limiter),
            cell_timeout,
            cancel,
        )
        .await?;
        let body_texts = recognize_cells(
            Arc::clone(&self.recognizer),
            body_cells,
            "body",
            limiter,
            cell_timeout,
            cancel,
        )
        .await?;

        let pairs = join_columns(&header_texts, &body_texts);
        let document = assemble_schedule(pairs, year, month);

        info!(
            columns = header_texts.len(),
            entries = document.entries.len(),
            strategy = %layout.selected,
            "Schedule assembled"
        );

        Ok(ExtractionOutcome::Schedule(Box::new(TableExtraction {
            document,
            layout,
            header_texts,
            body_texts,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(column: usize, text: &str) -> CellText {
        CellText {
            column,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_join_truncates_to_shared_columns() {
        let header = vec![cell(0, "9/1"), cell(1, "9/2"), cell(3, "9/4")];
        let body = vec![cell(0, "早"), cell(1, "遅"), cell(2, "夜")];
        let pairs = join_columns(&header, &body);
        assert_eq!(
            pairs,
            vec![
                ("9/1".to_string(), "早".to_string()),
                ("9/2".to_string(), "遅".to_string()),
            ]
        );
    }

    #[test]
    fn test_recognition_error_conversion() {
        assert_eq!(
            PipelineError::from(RecognitionError::Cancelled),
            PipelineError::Cancelled
        );
        let err = PipelineError::from(RecognitionError::Timeout("slow".to_string()));
        assert!(matches!(err, PipelineError::Recognition(_)));
        assert!(err.to_string().contains("OCR_TIMEOUT"));
    }

    #[test]
    fn test_no_table_reason_labels() {
        assert_eq!(NoTableReason::NoWords.to_string(), "no_words");
        assert_eq!(NoTableReason::NoColumns.as_str(), "no_columns");
    }
}
