//! # Pipeline Tests Module
//!
//! End-to-end extraction runs against synthetic tables and a scripted recognizer:
//! schedule assembly, no-table outcomes, retries, cancellation, sentinel substitution
//! and bounded cell concurrency.


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use shift_table_ocr::config::AppConfig;
    use shift_table_ocr::geometry::Word;
    use shift_table_ocr::layout::{BodySelection, Strategy, StrategyChoice};
    use shift_table_ocr::ocr::UNREADABLE_CELL;
    use shift_table_ocr::pipeline::{
        ExtractionOutcome, NoTableReason, PipelineError, TableExtraction, TableExtractor,
    };
    use shift_table_ocr::schedule::ScheduleEntry;
    use tokio_util::sync::CancellationToken;

    use super::test_helpers::{
        first_row_marker, header_marker, header_words, marker_texts, page_words,
        page_words_two_rows, table_image, ScriptedRecognizer, HEADER_Y,
    };

    const DUTIES: [&str; 6] = ["早番", "遅番", "夜勤", "休", "研修 (土)", "明け"];

    fn test_config(strategy: StrategyChoice) -> AppConfig {
        let mut config = AppConfig::default();
        config.pipeline.strategy = strategy;
        config.ocr.recovery.base_retry_delay_ms = 1;
        config.ocr.recovery.max_retry_delay_ms = 5;
        config
    }

    fn extractor(recognizer: Arc<ScriptedRecognizer>, config: AppConfig) -> TableExtractor {
        match TableExtractor::new(recognizer, config) {
            Ok(extractor) => extractor,
            Err(e) => panic!("extractor creation failed: {}", e),
        }
    }

    fn expect_schedule(result: Result<ExtractionOutcome, PipelineError>) -> TableExtraction {
        match result {
            Ok(ExtractionOutcome::Schedule(extraction)) => *extraction,
            Ok(ExtractionOutcome::NoTable(reason)) => panic!("expected a schedule, got {}", reason),
            Err(e) => panic!("extraction failed: {}", e),
        }
    }

    fn entry(date: &str, duty: &str) -> ScheduleEntry {
        ScheduleEntry {
            date: date.to_string(),
            duty: duty.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ruled_table_yields_full_schedule() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES));
        let extractor = extractor(
            Arc::clone(&recognizer),
            test_config(StrategyChoice::Fixed(Strategy::RobustPeak)),
        );

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        assert_eq!(extraction.layout.selected, Strategy::RobustPeak);
        assert_eq!(
            extraction.layout.boundaries.as_slice(),
            &[0, 100, 200, 300, 400, 500, 600]
        );
        assert_eq!(extraction.layout.expected_columns(), Some(6));
        assert_eq!(extraction.layout.candidates.len(), Strategy::ALL.len());

        assert_eq!(extraction.document.year, 2024);
        assert_eq!(extraction.document.month, 9);
        assert_eq!(
            extraction.document.entries,
            vec![
                entry("2024-09-01", "早番"),
                entry("2024-09-02", "遅番"),
                entry("2024-09-03", "夜勤"),
                entry("2024-09-04", "休"),
                entry("2024-09-05", "研修"),
                entry("2024-09-06", "明け"),
            ]
        );

        assert_eq!(recognizer.page_calls.load(Ordering::SeqCst), 1);
        assert_eq!(recognizer.cell_calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_auto_selection_keeps_header_and_body_aligned() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES));
        let extractor = extractor(recognizer, test_config(StrategyChoice::Auto));

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        assert!(!extraction.document.entries.is_empty());
        assert!(extraction.layout.boundaries.is_valid(600));
        for item in &extraction.document.entries {
            let day: usize = match item.date[8..].parse() {
                Ok(day) => day,
                Err(e) => panic!("bad date {}: {}", item.date, e),
            };
            let expected = shift_table_ocr::schedule::clean_duty(DUTIES[day - 1]);
            assert_eq!(item.duty, expected, "duty mismatch for {}", item.date);
        }
    }

    #[tokio::test]
    async fn test_no_words_is_not_a_table() {
        let recognizer = Arc::new(ScriptedRecognizer::new(Vec::new(), Default::default()));
        let extractor = extractor(recognizer, test_config(StrategyChoice::Auto));

        let cancel = CancellationToken::new();
        match extractor.extract(table_image(3), 2024, 9, &cancel).await {
            Ok(ExtractionOutcome::NoTable(reason)) => assert_eq!(reason, NoTableReason::NoWords),
            other => panic!("expected no table, got {:?}", other.map(|o| o.document().cloned())),
        }
    }

    #[tokio::test]
    async fn test_header_without_body_is_not_a_table() {
        let recognizer = Arc::new(ScriptedRecognizer::new(header_words(4), Default::default()));
        let extractor = extractor(recognizer, test_config(StrategyChoice::Auto));

        let cancel = CancellationToken::new();
        match extractor.extract(table_image(4), 2024, 9, &cancel).await {
            Ok(ExtractionOutcome::NoTable(reason)) => assert_eq!(reason, NoTableReason::NoBody),
            other => panic!("expected no table, got {:?}", other.map(|o| o.document().cloned())),
        }
    }

    #[tokio::test]
    async fn test_page_recognition_is_retried() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES).failing_pages(1));
        let mut config = test_config(StrategyChoice::Fixed(Strategy::RobustPeak));
        config.ocr.recovery.max_retries = 1;
        let extractor = extractor(Arc::clone(&recognizer), config);

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        assert_eq!(extraction.document.entries.len(), 6);
        assert_eq!(recognizer.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_recognition_error() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES).failing_pages(5));
        let mut config = test_config(StrategyChoice::Auto);
        config.ocr.recovery.max_retries = 2;
        let extractor = extractor(Arc::clone(&recognizer), config);

        let cancel = CancellationToken::new();
        match extractor.extract(table_image(6), 2024, 9, &cancel).await {
            Err(PipelineError::Recognition(_)) => {}
            other => panic!("expected recognition error, got {:?}", other.map(|o| o.document().cloned())),
        }
        assert_eq!(recognizer.page_calls.load(Ordering::SeqCst), 3);
        assert_eq!(recognizer.cell_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_cancelled() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES));
        let extractor = extractor(recognizer, test_config(StrategyChoice::Auto));

        let cancel = CancellationToken::new();
        cancel.cancel();
        match extractor.extract(table_image(6), 2024, 9, &cancel).await {
            Err(PipelineError::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other.map(|o| o.document().cloned())),
        }
    }

    #[tokio::test]
    async fn test_cancellation_during_cell_recognition() {
        let recognizer = Arc::new(
            ScriptedRecognizer::for_duties(&DUTIES).with_cell_delay(Duration::from_millis(200)),
        );
        let mut config = test_config(StrategyChoice::Fixed(Strategy::RobustPeak));
        config.pipeline.cell_concurrency = 1;
        let extractor = extractor(recognizer, config);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        match extractor.extract(table_image(6), 2024, 9, &cancel).await {
            Err(PipelineError::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other.map(|o| o.document().cloned())),
        }
    }

    #[tokio::test]
    async fn test_failed_cells_become_sentinels() {
        let recognizer = Arc::new(
            ScriptedRecognizer::for_duties(&DUTIES)
                .failing_marker(first_row_marker(1))
                .failing_marker(header_marker(3)),
        );
        let extractor = extractor(
            recognizer,
            test_config(StrategyChoice::Fixed(Strategy::RobustPeak)),
        );

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        assert_eq!(extraction.body_texts[1].text, UNREADABLE_CELL);
        assert_eq!(extraction.header_texts[3].text, UNREADABLE_CELL);
        assert!(extraction
            .header_texts
            .iter()
            .chain(&extraction.body_texts)
            .all(|cell| !cell.text.is_empty()));

        // Unreadable header drops the column, unreadable duty keeps the date
        let dates: Vec<&str> = extraction
            .document
            .entries
            .iter()
            .map(|e| e.date.as_str())
            .collect();
        assert_eq!(
            dates,
            vec!["2024-09-01", "2024-09-02", "2024-09-03", "2024-09-05", "2024-09-06"]
        );
        assert_eq!(extraction.document.entries[1].duty, UNREADABLE_CELL);
    }

    #[tokio::test]
    async fn test_cell_concurrency_is_bounded() {
        let recognizer = Arc::new(
            ScriptedRecognizer::for_duties(&DUTIES).with_cell_delay(Duration::from_millis(20)),
        );
        let mut config = test_config(StrategyChoice::Fixed(Strategy::RobustPeak));
        config.pipeline.cell_concurrency = 2;
        let extractor = extractor(Arc::clone(&recognizer), config);

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        assert_eq!(extraction.document.entries.len(), 6);
        assert!(recognizer.max_in_flight.load(Ordering::SeqCst) <= 2);
        let columns: Vec<usize> = extraction.body_texts.iter().map(|c| c.column).collect();
        assert_eq!(columns, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_timed_out_cells_keep_concurrency_bounded() {
        let recognizer = Arc::new(
            ScriptedRecognizer::for_duties(&DUTIES).with_cell_delay(Duration::from_millis(1300)),
        );
        let mut config = test_config(StrategyChoice::Fixed(Strategy::RobustPeak));
        config.pipeline.cell_concurrency = 2;
        config.ocr.recovery.cell_timeout_secs = 1;
        let extractor = extractor(Arc::clone(&recognizer), config);

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        assert_eq!(extraction.header_texts.len(), 6);
        assert_eq!(extraction.body_texts.len(), 6);
        assert!(extraction.header_texts.iter().all(|c| c.text == UNREADABLE_CELL));
        assert!(extraction.body_texts.iter().all(|c| c.text == UNREADABLE_CELL));
        assert!(extraction.document.is_empty());
        assert!(recognizer.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_ruling_artifacts_are_cleaned_once() {
        let mut words = page_words(&DUTIES);
        for word in words.iter_mut().take(DUTIES.len()) {
            word.text = format!("|{}|", word.text);
        }
        for column in 1..DUTIES.len() as i32 {
            words.push(Word::new("|", column * 100 - 1, HEADER_Y.0, column * 100 + 2, HEADER_Y.1));
        }
        let recognizer = Arc::new(ScriptedRecognizer::new(words, marker_texts(&DUTIES, &[])));
        let extractor = extractor(
            recognizer,
            test_config(StrategyChoice::Fixed(Strategy::RobustPeak)),
        );

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(6), 2024, 9, &cancel).await);

        let header: Vec<&str> = extraction
            .layout
            .header_row
            .words
            .iter()
            .map(|w| w.text.as_str())
            .collect();
        assert_eq!(header, vec!["9/1", "9/2", "9/3", "9/4", "9/5", "9/6"]);
        assert_eq!(extraction.document.entries.len(), 6);
    }

    #[tokio::test]
    async fn test_single_duty_row_selection() {
        let first = ["早番", "遅番", "夜勤"];
        let second = ["休", "明け", "早番"];
        let recognizer = Arc::new(ScriptedRecognizer::new(
            page_words_two_rows(&first, &second),
            marker_texts(&first, &second),
        ));
        let mut config = test_config(StrategyChoice::Fixed(Strategy::RobustPeak));
        config.pipeline.body_selection = BodySelection::Row(1);
        let extractor = extractor(recognizer, config);

        let cancel = CancellationToken::new();
        let extraction = expect_schedule(extractor.extract(table_image(3), 2024, 9, &cancel).await);

        assert_eq!(
            extraction.document.entries,
            vec![
                entry("2024-09-01", "休"),
                entry("2024-09-02", "明け"),
                entry("2024-09-03", "早番"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_duty_row_is_not_a_table() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES));
        let mut config = test_config(StrategyChoice::Auto);
        config.pipeline.body_selection = BodySelection::Row(3);
        let extractor = extractor(recognizer, config);

        let cancel = CancellationToken::new();
        match extractor.extract(table_image(6), 2024, 9, &cancel).await {
            Ok(ExtractionOutcome::NoTable(reason)) => assert_eq!(reason, NoTableReason::NoBody),
            other => panic!("expected no table, got {:?}", other.map(|o| o.document().cloned())),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let recognizer = Arc::new(ScriptedRecognizer::for_duties(&DUTIES));
        let mut config = AppConfig::default();
        config.pipeline.cell_concurrency = 0;
        assert!(TableExtractor::new(recognizer, config).is_err());
    }
}
