use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Naive formats seen in upstream payloads, most specific first.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601-ish timestamp into a comparable value.
///
/// Offset-aware values compare on their UTC instant; naive values compare on
/// the wall clock as written. Date-only values read as midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    // RFC 3339 with a space separator, e.g. "2026-03-14 15:00:00+00:00"
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_utc());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Calendar year of a timestamp as written, used as a season fallback.
///
/// Offset-aware values keep their local date; a kickoff just after midnight
/// on 1 January belongs to the new year even when UTC is still in the old one.
pub fn year_of(value: &str) -> Option<String> {
    use chrono::Datelike;
    let trimmed = value.trim();
    let local = DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z"))
        .map(|dt| dt.naive_local())
        .ok();
    local
        .or_else(|| parse_timestamp(trimmed))
        .map(|dt| dt.year().to_string())
}
