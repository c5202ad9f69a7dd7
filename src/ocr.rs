//! # Word Recognition Module
//!
//! This module wraps the external word recognizer behind the [`WordRecognizer`] trait and
//! provides the async plumbing the pipeline needs around it.
//!
//! ## Features
//!
//! - Whole-image recognition with timeout, retries and exponential backoff with jitter
//! - Per-cell recognition with bounded concurrency, re-assembled by column index
//! - Caller-level cancellation through a [`CancellationToken`]
//! - Cleanup of recognized words and cell text
//! - hOCR word box parsing for engines that report words that way
//!
//! Recognizers are synchronous and run on the blocking thread pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::errors::error_logging;
use crate::geometry::Word;
use crate::layout::slicing::{ensure_min_canvas, MIN_CANVAS_PX};
use crate::layout::Cell;
use crate::observability;
use crate::ocr_config::RecoveryConfig;
pub use crate::ocr_errors::RecognitionError;

/// Placeholder for a cell whose text could not be read
pub const UNREADABLE_CELL: &str = "??";

/// Output of one recognizer call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Full recognized text
    pub text: String,
    /// Individual words with absolute pixel boxes
    pub words: Vec<Word>,
}

/// A synchronous text recognizer.
///
/// Implementations must be usable from several blocking threads at once.
pub trait WordRecognizer: Send + Sync {
    /// Recognize a whole photograph, reporting word boxes
    fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText, RecognitionError>;

    /// Recognize a single padded table cell
    fn recognize_cell(&self, image: &DynamicImage) -> Result<RecognizedText, RecognitionError> {
        self.recognize(image)
    }
}

/// Recognized text of one cell, keyed by its column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellText {
    pub column: usize,
    /// Cleaned text, never empty
    pub text: String,
}

impl CellText {
    pub fn is_unreadable(&self) -> bool {
        self.text == UNREADABLE_CELL
    }
}

lazy_static! {
    static ref CELL_BRACKETS: Regex =
        Regex::new(r"[()（）\[\]{}]").expect("Invalid cell bracket regex pattern");
    static ref HOCR_WORD: Regex = Regex::new(
        r#"(?s)<span[^>]*class=['"]ocrx_word['"][^>]*title=['"]bbox (\d+) (\d+) (\d+) (\d+)[^'"]*['"][^>]*>(.*?)</span>"#
    )
    .expect("Invalid hOCR word regex pattern");
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("Invalid HTML tag regex pattern");
}

/// Normalize whole-image words before layout analysis.
///
/// Drops bare `|` tokens (table rules read as text), strips one leading and one trailing
/// `|`, removes every `日` (so `1日` reads as a bare day, and `日勤` becomes `勤`), and
/// drops words left empty. Apply it once per recognition pass.
pub fn clean_recognized_words(words: Vec<Word>) -> Vec<Word> {
    words
        .into_iter()
        .filter_map(|word| {
            let trimmed = word.text.trim();
            if trimmed == "|" {
                return None;
            }
            let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
            let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
            let text = trimmed.replace('日', "").trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(Word { text, ..word })
        })
        .collect()
}

/// Replace brackets with spaces and trim
pub fn clean_cell_text(text: &str) -> String {
    CELL_BRACKETS.replace_all(text, " ").trim().to_string()
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extract word boxes from an hOCR document.
///
/// Every `ocrx_word` span contributes one [`Word`] with its `bbox`; nested markup is
/// removed, entities are decoded and empty words are skipped.
pub fn parse_hocr_words(hocr: &str) -> Vec<Word> {
    HOCR_WORD
        .captures_iter(hocr)
        .filter_map(|caps| {
            let coord = |i: usize| caps.get(i)?.as_str().parse::<i32>().ok();
            let text = unescape_html(&HTML_TAG.replace_all(caps.get(5)?.as_str(), ""));
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Word::new(text, coord(1)?, coord(2)?, coord(3)?, coord(4)?))
        })
        .collect()
}

/// Calculate retry delay with exponential backoff
///
/// Implements exponential backoff with jitter so retries from concurrent runs spread out.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay)
/// final_delay = delay + random(0, delay/4)
/// ```
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(recovery.max_retry_delay_ms);

    let jitter = rand::random::<u64>() % (delay / 4 + 1);
    delay + jitter
}

/// Run a recognizer call on the blocking pool with a timeout, abandoning it on cancellation
async fn run_blocking<F>(
    call: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<RecognizedText, RecognitionError>
where
    F: FnOnce() -> Result<RecognizedText, RecognitionError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(call);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RecognitionError::Cancelled),
        joined = tokio::time::timeout(timeout, handle) => match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RecognitionError::Extraction(format!(
                "Recognizer task failed: {e}"
            ))),
            Err(_) => Err(RecognitionError::Timeout(format!(
                "Recognition exceeded {}ms",
                timeout.as_millis()
            ))),
        },
    }
}

/// Recognize the whole photograph with retries.
///
/// Each attempt is bounded by `operation_timeout_secs`; failed attempts are retried up to
/// `max_retries` times with [`calculate_retry_delay`] between them. Cancellation is never
/// retried and interrupts a pending backoff sleep.
pub async fn recognize_page(
    recognizer: Arc<dyn WordRecognizer>,
    image: Arc<DynamicImage>,
    recovery: &RecoveryConfig,
    cancel: &CancellationToken,
) -> Result<RecognizedText, RecognitionError> {
    let span = observability::recognition_span("page");
    async move {
        let start_time = Instant::now();
        let timeout = Duration::from_secs(recovery.operation_timeout_secs);
        let max_attempts = recovery.max_retries + 1;
        let mut attempt = 0;

        info!("Starting whole-image recognition");

        loop {
            attempt += 1;
            let recognizer = Arc::clone(&recognizer);
            let page = Arc::clone(&image);

            match run_blocking(move || recognizer.recognize(&page), timeout, cancel).await {
                Ok(text) => {
                    let total_duration = start_time.elapsed();
                    observability::record_recognition_metrics(true, total_duration, attempt);
                    info!(
                        "Recognition completed on attempt {} in {}ms, {} words",
                        attempt,
                        total_duration.as_millis(),
                        text.words.len()
                    );
                    return Ok(text);
                }
                Err(RecognitionError::Cancelled) => {
                    debug!("Recognition cancelled on attempt {attempt}");
                    return Err(RecognitionError::Cancelled);
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        let total_duration = start_time.elapsed();
                        observability::record_recognition_metrics(false, total_duration, attempt);
                        error_logging::log_recognition_error(
                            &err,
                            "recognize_page",
                            Some(image.dimensions()),
                            Some(attempt),
                            Some(total_duration),
                        );
                        return Err(err);
                    }

                    let delay_ms = calculate_retry_delay(attempt, recovery);
                    warn!("Recognition attempt {attempt} failed: {err}. Retrying in {delay_ms}ms");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RecognitionError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                    }
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// Turn one cell result into display text, falling back to [`UNREADABLE_CELL`]
fn cell_text_or_sentinel(
    result: Result<RecognizedText, RecognitionError>,
    band: &str,
    column: usize,
    dimensions: (u32, u32),
) -> String {
    match result {
        Ok(recognized) => {
            let text = clean_cell_text(&recognized.text);
            if text.is_empty() {
                debug!(band, column, "Cell recognized as blank");
                UNREADABLE_CELL.to_string()
            } else {
                text
            }
        }
        Err(err) => {
            error_logging::log_cell_error(&err, band, column, dimensions);
            UNREADABLE_CELL.to_string()
        }
    }
}

/// Recognize every cell of a band.
///
/// Undersized cells are padded to 32×32 before recognition. Every recognizer call holds
/// one permit of `limiter` until the call itself returns, so a cell abandoned on timeout
/// keeps its slot until the blocking work ends. Results come back in the order of
/// `cells`, whatever order they finish in. Blank text and per-cell failures become
/// [`UNREADABLE_CELL`]. The only error is [`RecognitionError::Cancelled`].
pub async fn recognize_cells(
    recognizer: Arc<dyn WordRecognizer>,
    cells: Vec<Cell>,
    band: &'static str,
    limiter: Arc<Semaphore>,
    cell_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<CellText>, RecognitionError> {
    let span = observability::recognition_span("cells");
    async move {
        let mut texts: Vec<CellText> = cells
            .iter()
            .map(|cell| CellText {
                column: cell.column,
                text: UNREADABLE_CELL.to_string(),
            })
            .collect();

        let mut tasks = JoinSet::new();

        for (position, cell) in cells.into_iter().enumerate() {
            let semaphore = Arc::clone(&limiter);
            let recognizer = Arc::clone(&recognizer);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let dimensions = cell.image.dimensions();
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let padded = ensure_min_canvas(&cell.image, MIN_CANVAS_PX, MIN_CANVAS_PX);
                        run_blocking(
                            move || {
                                let _permit = permit;
                                recognizer.recognize_cell(&padded)
                            },
                            cell_timeout,
                            &cancel,
                        )
                        .await
                    }
                    Err(_) => Err(RecognitionError::Cancelled),
                };
                (position, cell.column, dimensions, result)
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(RecognitionError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((position, column, dimensions, result))) => {
                    if matches!(result, Err(RecognitionError::Cancelled)) {
                        tasks.abort_all();
                        return Err(RecognitionError::Cancelled);
                    }
                    texts[position].text = cell_text_or_sentinel(result, band, column, dimensions);
                }
                Some(Err(e)) => {
                    warn!(band, "Cell recognition task failed: {e}");
                }
            }
        }

        let unreadable = texts.iter().filter(|t| t.is_unreadable()).count();
        observability::record_cell_metrics(band, texts.len() - unreadable, unreadable);
        debug!(band, cells = texts.len(), unreadable, "Cell recognition finished");

        Ok(texts)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_recognized_words() {
        let words = vec![
            Word::new("|", 0, 0, 2, 20),
            Word::new("|9/1", 10, 0, 40, 20),
            Word::new("7日", 50, 0, 70, 20),
            Word::new("日", 80, 0, 90, 20),
            Word::new("日勤|", 100, 0, 140, 20),
        ];
        let cleaned = clean_recognized_words(words);
        let texts: Vec<&str> = cleaned.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["9/1", "7", "勤"]);
        assert_eq!(cleaned[0].left, 10);
    }

    #[test]
    fn test_clean_recognized_words_strips_one_pipe_per_side() {
        let cleaned = clean_recognized_words(vec![Word::new("|a||", 0, 0, 20, 20)]);
        assert_eq!(cleaned[0].text, "a|");
    }

    #[test]
    fn test_clean_cell_text() {
        assert_eq!(clean_cell_text(" (日勤) "), "日勤");
        assert_eq!(clean_cell_text("【A】[B]{C}"), "【A】 B  C");
        assert_eq!(clean_cell_text("（）"), "");
    }

    #[test]
    fn test_parse_hocr_words() {
        let hocr = r#"
            <span class='ocr_line' id='line_1_1' title="bbox 10 20 300 50">
              <span class='ocrx_word' id='word_1_1' title='bbox 10 20 60 50; x_wconf 91'>9/1</span>
              <span class='ocrx_word' id='word_1_2' title='bbox 80 21 130 49; x_wconf 88'><strong>A&amp;B</strong></span>
              <span class='ocrx_word' id='word_1_3' title='bbox 140 21 150 49; x_wconf 10'> </span>
            </span>"#;
        let words = parse_hocr_words(hocr);
        assert_eq!(
            words,
            vec![
                Word::new("9/1", 10, 20, 60, 50),
                Word::new("A&B", 80, 21, 130, 49),
            ]
        );
    }

    #[test]
    fn test_retry_delay_backoff_with_jitter() {
        let recovery = RecoveryConfig {
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 300,
            ..RecoveryConfig::default()
        };
        let first = calculate_retry_delay(1, &recovery);
        assert!((100..=125).contains(&first));
        let second = calculate_retry_delay(2, &recovery);
        assert!((200..=250).contains(&second));
        let capped = calculate_retry_delay(10, &recovery);
        assert!((300..=375).contains(&capped));
    }

    #[test]
    fn test_retry_delay_tiny_base() {
        let recovery = RecoveryConfig {
            base_retry_delay_ms: 1,
            max_retry_delay_ms: 2,
            ..RecoveryConfig::default()
        };
        assert!(calculate_retry_delay(1, &recovery) <= 1);
    }

    #[test]
    fn test_sentinel_for_blank_and_failed_cells() {
        let blank = cell_text_or_sentinel(Ok(RecognizedText::default()), "body", 0, (40, 40));
        assert_eq!(blank, UNREADABLE_CELL);
        let failed = cell_text_or_sentinel(
            Err(RecognitionError::Extraction("boom".to_string())),
            "body",
            1,
            (40, 40),
        );
        assert_eq!(failed, UNREADABLE_CELL);
        let ok = cell_text_or_sentinel(
            Ok(RecognizedText {
                text: " 夜勤\n".to_string(),
                words: Vec::new(),
            }),
            "body",
            2,
            (40, 40),
        );
        assert_eq!(ok, "夜勤");
    }
}
