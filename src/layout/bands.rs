//! # Band Locator
//!
//! Groups recognized words into rows, picks the row that looks most like a date header
//! and derives the full-width header and body bands from it.

use lazy_static::lazy_static;
use regex::Regex;

use super::types::{BodySelection, HeaderRow};
use crate::clustering::cluster_1d;
use crate::geometry::{Band, BandKind, Rect, Word};

/// Minimum vertical gap used when clustering rows
pub const MIN_ROW_GAP_PX: f64 = 24.0;
/// Minimum vertical margin added around the header row
pub const MIN_HEADER_MARGIN_PX: f64 = 8.0;
/// Margin added around the body words
pub const BODY_MARGIN_PX: i32 = 8;

lazy_static! {
    static ref DATE_TOKEN: Regex =
        Regex::new(r"^\d{1,2}/\d{1,2}$").expect("Invalid date token regex pattern");
    static ref DAY_TOKEN: Regex =
        Regex::new(r"^\d{1,2}$").expect("Invalid day token regex pattern");
}

/// Median word height, `0.0` for no words
pub fn median_word_height(words: &[Word]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let mut heights: Vec<i32> = words.iter().map(Word::height).collect();
    heights.sort_unstable();
    let mid = heights.len() / 2;
    if heights.len() % 2 == 0 {
        (f64::from(heights[mid - 1]) + f64::from(heights[mid])) / 2.0
    } else {
        f64::from(heights[mid])
    }
}

/// Vertical clustering gap for a page with the given median word height
pub fn row_gap(median_height: f64) -> f64 {
    (median_height * 0.9).max(MIN_ROW_GAP_PX)
}

/// Group words into rows by vertical centre, top to bottom
pub fn cluster_rows(words: &[Word]) -> Vec<Vec<&Word>> {
    let gap = row_gap(median_word_height(words));
    cluster_1d(words.iter(), |w| w.center_y(), gap)
}

/// Count `(date tokens, bare day tokens)` in a row
fn count_header_tokens(row: &[&Word]) -> (usize, usize) {
    row.iter().fold((0, 0), |(dates, days), word| {
        let token = word.text.trim();
        if DATE_TOKEN.is_match(token) {
            (dates + 1, days)
        } else if DAY_TOKEN.is_match(token) {
            (dates, days + 1)
        } else {
            (dates, days)
        }
    })
}

/// Pick the row that scores highest as a date header.
///
/// Rows score `2 × date tokens + bare day tokens`. Ties and an all-zero page fall back to
/// the topmost row. Returns `None` when there are no words.
pub fn locate_header_row(words: &[Word]) -> Option<HeaderRow> {
    let median_height = median_word_height(words);
    let rows = cluster_1d(words.iter(), |w| w.center_y(), row_gap(median_height));

    let mut best: Option<(usize, usize, usize, &Vec<&Word>)> = None;
    for row in &rows {
        let (dates, days) = count_header_tokens(row);
        let score = 2 * dates + days;
        match best {
            Some((best_score, ..)) if score <= best_score => {}
            _ => best = Some((score, dates, days, row)),
        }
    }

    let (score, date_tokens, day_tokens, row) = best?;
    let bounds = Rect::bounding(row.iter().copied())?;
    let mut row_words: Vec<Word> = row.iter().map(|w| (*w).clone()).collect();
    row_words.sort_by_key(|w| w.left);

    tracing::debug!(
        target: "layout",
        rows = rows.len(),
        score,
        date_tokens,
        day_tokens,
        top = bounds.top,
        bottom = bounds.bottom,
        "Selected header row"
    );

    Some(HeaderRow {
        words: row_words,
        score,
        date_tokens,
        day_tokens,
        bounds,
        median_height,
    })
}

/// Full-width header band around an already selected header row
pub fn header_band_from_row(row: &HeaderRow, image_width: u32) -> Band {
    let margin = (row.median_height * 0.5).max(MIN_HEADER_MARGIN_PX).round() as i32;
    let width = i32::try_from(image_width).unwrap_or(i32::MAX);
    Band::new(
        BandKind::Header,
        Rect::new(
            0,
            (row.bounds.top - margin).max(0),
            width,
            row.bounds.bottom + margin,
        ),
    )
}

/// Locate the date header band, `None` when there are no words
pub fn locate_header_band(words: &[Word], image_width: u32) -> Option<Band> {
    locate_header_row(words).map(|row| header_band_from_row(&row, image_width))
}

/// Words whose top edge lies strictly below the header band
fn words_below<'a>(words: &'a [Word], header: &Band) -> Vec<&'a Word> {
    words
        .iter()
        .filter(|w| w.top > header.rect.bottom)
        .collect()
}

fn padded_band(bounds: Rect, padding: i32, image_width: u32, image_height: u32) -> Band {
    let width = i32::try_from(image_width).unwrap_or(i32::MAX);
    let height = i32::try_from(image_height).unwrap_or(i32::MAX);
    Band::new(
        BandKind::Body,
        Rect::new(
            0,
            (bounds.top - padding).max(0),
            width,
            (bounds.bottom + padding).min(height),
        ),
    )
}

/// Locate the body band below the header, `None` when no words lie below it
pub fn locate_body_band(
    words: &[Word],
    header: &Band,
    image_width: u32,
    image_height: u32,
) -> Option<Band> {
    let below = words_below(words, header);
    let bounds = Rect::bounding(below.iter().copied())?;
    Some(padded_band(bounds, BODY_MARGIN_PX, image_width, image_height))
}

/// Every clustered row as a full-width band, top to bottom
pub fn row_bands(words: &[Word], image_width: u32, image_height: u32, padding: i32) -> Vec<Band> {
    cluster_rows(words)
        .into_iter()
        .filter_map(|row| Rect::bounding(row.iter().copied()))
        .map(|bounds| padded_band(bounds, padding, image_width, image_height))
        .collect()
}

/// Body band for the requested selection
pub fn select_body_band(
    words: &[Word],
    header: &Band,
    selection: BodySelection,
    image_width: u32,
    image_height: u32,
) -> Option<Band> {
    match selection {
        BodySelection::AllBelowHeader => {
            locate_body_band(words, header, image_width, image_height)
        }
        BodySelection::Row(index) => {
            let below: Vec<Word> = words_below(words, header).into_iter().cloned().collect();
            row_bands(&below, image_width, image_height, BODY_MARGIN_PX)
                .into_iter()
                .nth(index)
        }
    }
}
