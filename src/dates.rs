//! Parsing of provider `Date` headers into epoch seconds.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Formats tried in order; the first successful parse wins.
const DATE_FORMATS: &[&str] = &[
    // Mon, 15 Mar 2023 10:30:45 +0000
    "%a, %d %b %Y %H:%M:%S %z",
    // 29 Nov 2024 09:39:18 +0000
    BARE_FORMAT,
];

const BARE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// Parse a raw `Date` header, returning `None` when no known format matches.
///
/// A trailing parenthesised comment such as `(UTC)` or `(PST)` is dropped
/// before parsing. The weekday, when present, is not checked against the
/// date.
pub fn parse_date_header(raw: &str) -> Option<i64> {
    let trimmed = raw.split(" (").next().unwrap_or(raw).trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            // chrono rejects a weekday that disagrees with the date
            let rest = strip_weekday(trimmed)?;
            DateTime::parse_from_str(rest, BARE_FORMAT).ok()
        })
        .map(|date| date.timestamp())
}

/// `"Mon, 15 Mar ..."` -> `"15 Mar ..."`
fn strip_weekday(raw: &str) -> Option<&str> {
    let (day, rest) = raw.split_once(',')?;
    (day.len() == 3 && day.chars().all(|c| c.is_ascii_alphabetic())).then(|| rest.trim_start())
}

/// Parse a raw `Date` header, falling back to `now` when nothing matches.
///
/// A malformed date never blocks ingestion.
pub fn parse_received(raw: &str, now: DateTime<Utc>) -> i64 {
    match parse_date_header(raw) {
        Some(ts) => ts,
        None => {
            warn!(
                date = %raw,
                "Failed to parse date with any known format, using current time"
            );
            now.timestamp()
        }
    }
}
