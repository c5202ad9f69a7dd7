//! # Schedule Assembly
//!
//! Turns `(header text, duty text)` column pairs into a dated schedule document.
//!
//! Header cells are parsed as `M/D` dates or as bare day numbers in the default month.
//! Columns whose header does not parse, or whose date does not exist in the calendar,
//! are skipped. Duty text loses weekday glyphs, brackets and repeated whitespace.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AppResult;

lazy_static! {
    static ref NON_DATE_CHARS: Regex = Regex::new(r"[^0-9/]").expect("Invalid date filter regex pattern");
    static ref MONTH_DAY: Regex =
        Regex::new(r"(\d{1,2})\s*/\s*(\d{1,2})").expect("Invalid month/day regex pattern");
    static ref DAY_ONLY: Regex = Regex::new(r"^\s*(\d{1,2})\s*$").expect("Invalid day regex pattern");
    static ref WEEKDAY_GLYPHS: Regex = Regex::new(r"[月火水木金土日]").expect("Invalid weekday regex pattern");
    static ref BRACKETS: Regex = Regex::new(r"[()（）\[\]{}]").expect("Invalid bracket regex pattern");
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("Invalid whitespace regex pattern");
}

/// A month/day pair read from a header cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

/// One dated duty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// ISO date, `YYYY-MM-DD`
    pub date: String,
    pub duty: String,
}

/// Schedule for one photographed table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub year: i32,
    pub month: u32,
    pub entries: Vec<ScheduleEntry>,
}

impl ScheduleDocument {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a header cell into a month and day.
///
/// Everything except digits and `/` is treated as whitespace. An `M/D` pair anywhere in
/// the text wins; otherwise a lone one or two digit number is a day of `default_month`.
/// Months outside 1–12 and days outside 1–31 are rejected.
///
/// ```
/// use shift_table_ocr::schedule::{parse_date, MonthDay};
///
/// assert_eq!(parse_date("9/14(土)", 2024, 9), Some(MonthDay { month: 9, day: 14 }));
/// assert_eq!(parse_date("7", 2024, 9), Some(MonthDay { month: 9, day: 7 }));
/// assert_eq!(parse_date("土", 2024, 9), None);
/// ```
pub fn parse_date(text: &str, _default_year: i32, default_month: u32) -> Option<MonthDay> {
    let cleaned = NON_DATE_CHARS.replace_all(text, " ");
    let cleaned = cleaned.trim();

    let parsed = if let Some(caps) = MONTH_DAY.captures(cleaned) {
        MonthDay {
            month: caps[1].parse().ok()?,
            day: caps[2].parse().ok()?,
        }
    } else {
        let caps = DAY_ONLY.captures(cleaned)?;
        MonthDay {
            month: default_month,
            day: caps[1].parse().ok()?,
        }
    };

    if (1..=12).contains(&parsed.month) && (1..=31).contains(&parsed.day) {
        Some(parsed)
    } else {
        None
    }
}

/// Strip weekday glyphs and brackets, collapse whitespace
pub fn clean_duty(text: &str) -> String {
    let without_days = WEEKDAY_GLYPHS.replace_all(text, "");
    let without_brackets = BRACKETS.replace_all(&without_days, " ");
    WHITESPACE_RUN
        .replace_all(&without_brackets, " ")
        .trim()
        .to_string()
}

/// Build a schedule from `(header text, duty text)` pairs in column order
pub fn assemble_schedule<H, D>(
    pairs: impl IntoIterator<Item = (H, D)>,
    year: i32,
    month: u32,
) -> ScheduleDocument
where
    H: AsRef<str>,
    D: AsRef<str>,
{
    let mut entries = Vec::new();

    for (column, (header, duty)) in pairs.into_iter().enumerate() {
        let header = header.as_ref();
        let Some(parsed) = parse_date(header, year, month) else {
            debug!(column, header = %header, "Skipping column without a date header");
            continue;
        };
        let Some(date) = NaiveDate::from_ymd_opt(year, parsed.month, parsed.day) else {
            debug!(
                column,
                month = parsed.month,
                day = parsed.day,
                "Skipping column with a date missing from the calendar"
            );
            continue;
        };

        entries.push(ScheduleEntry {
            date: date.format("%Y-%m-%d").to_string(),
            duty: clean_duty(duty.as_ref()),
        });
    }

    ScheduleDocument {
        year,
        month,
        entries,
    }
}

/// Serialize a document as compact JSON
pub fn to_json(document: &ScheduleDocument) -> AppResult<String> {
    Ok(serde_json::to_string(document)?)
}

/// Serialize a document as indented JSON
pub fn to_json_pretty(document: &ScheduleDocument) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Decode a JSON list of schedule entries, tolerating a Markdown code fence.
///
/// Unknown fields are ignored. Anything that does not decode yields an empty list and a
/// warning.
pub fn parse_schedule_list(raw: &str) -> Vec<ScheduleEntry> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    match serde_json::from_str::<Vec<ScheduleEntry>>(body) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Failed to decode schedule list");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("9/1", 2024, 9), Some(MonthDay { month: 9, day: 1 }));
        assert_eq!(parse_date(" 10 / 31 ", 2024, 9), Some(MonthDay { month: 10, day: 31 }));
        assert_eq!(parse_date("(月)12/3", 2024, 9), Some(MonthDay { month: 12, day: 3 }));
        assert_eq!(parse_date("15", 2024, 6), Some(MonthDay { month: 6, day: 15 }));
        assert_eq!(parse_date("13/1", 2024, 9), None);
        assert_eq!(parse_date("9/0", 2024, 9), None);
        assert_eq!(parse_date("123", 2024, 9), None);
        assert_eq!(parse_date("??", 2024, 9), None);
        assert_eq!(parse_date("", 2024, 9), None);
    }

    #[test]
    fn test_clean_duty() {
        assert_eq!(clean_duty("早番 (火)"), "早番");
        assert_eq!(clean_duty("  A   B\nC "), "A B C");
        assert_eq!(clean_duty("[夜]"), "夜");
    }

    #[test]
    fn test_assemble_skips_bad_columns() {
        let pairs = vec![
            ("9/1", "早番"),
            ("??", "休"),
            ("9/31", "遅番"),
            ("2", "夜勤(水)"),
        ];
        let document = assemble_schedule(pairs, 2024, 9);
        assert_eq!(
            document.entries,
            vec![
                ScheduleEntry {
                    date: "2024-09-01".to_string(),
                    duty: "早番".to_string()
                },
                ScheduleEntry {
                    date: "2024-09-02".to_string(),
                    duty: "夜勤".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_to_json_shape() {
        let document = assemble_schedule(vec![("2/29", "休")], 2024, 2);
        let json = match to_json(&document) {
            Ok(json) => json,
            Err(e) => panic!("serialization failed: {}", e),
        };
        assert_eq!(
            json,
            r#"{"year":2024,"month":2,"entries":[{"date":"2024-02-29","duty":"休"}]}"#
        );
    }

    #[test]
    fn test_parse_schedule_list() {
        let fenced = "```json\n[{\"date\":\"2024-09-01\",\"duty\":\"早番\",\"note\":1}]\n```";
        let entries = parse_schedule_list(fenced);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].duty, "早番");

        assert!(parse_schedule_list("not json").is_empty());
        assert_eq!(parse_schedule_list("[]").len(), 0);
    }
}
