//! Filename grammar for meeting artifacts.
//!
//! Source files follow `YYYY-MM-DD_<SourceToken>_<Body Words>_<trailing>.txt`,
//! e.g. `2026-01-28_Municipality_Commission_Meeting_-_01272026.txt` or
//! `2026-01-27_mtleb_minutes_CM.txt`. The date prefix is the meeting identity
//! key; the remaining tokens name the governing body. This module is the only
//! place that grammar is interpreted; callers get a structured result
//! instead of slicing strings themselves.

use chrono::NaiveDate;

/// Ingestion-source tokens that precede the body name and carry no meaning
/// for meeting identity.
const SOURCE_TOKENS: &[&str] = &[
    "Municipality",
    "SchoolBoard",
    "SchoolBoardPresentations",
    "mtleb",
    "minutes",
];

/// Parsed identity of a source filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceName {
    /// Meeting date, when the filename carries a valid `YYYY-MM-DD` prefix.
    pub date: Option<NaiveDate>,
    /// Governing body, e.g. "Commission Meeting". Falls back to
    /// "Unknown Meeting" when nothing usable remains.
    pub body: String,
}

impl SourceName {
    pub fn parse(filename: &str) -> Self {
        Self {
            date: parse_date(filename),
            body: parse_body(filename),
        }
    }
}

/// The validated `YYYY-MM-DD` prefix of a filename, if present.
pub fn date_prefix(filename: &str) -> Option<&str> {
    let prefix = filename.get(0..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
    Some(prefix)
}

fn parse_date(filename: &str) -> Option<NaiveDate> {
    let prefix = filename.get(0..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn parse_body(filename: &str) -> String {
    let mut name = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    // Strip the "YYYY-MM-DD" prefix and its separator when present. The
    // prefix is pure ASCII, so slicing at its length is boundary-safe even
    // when the very next character is multibyte.
    if let Some(prefix) = date_prefix(name) {
        let rest = &name[prefix.len()..];
        name = rest.strip_prefix('_').unwrap_or(rest);
    }

    let mut parts: Vec<&str> = name.split('_').filter(|p| !p.is_empty()).collect();
    while parts
        .first()
        .is_some_and(|p| SOURCE_TOKENS.contains(p))
    {
        parts.remove(0);
    }
    // Drop trailing date-like runs ("01272026") and dash separators.
    while parts
        .last()
        .is_some_and(|p| !p.is_empty() && p.replace('-', "").chars().all(|c| c.is_ascii_digit()))
    {
        parts.pop();
    }
    while parts.last() == Some(&"-") {
        parts.pop();
    }

    if parts.is_empty() {
        "Unknown Meeting".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_municipality_transcript_name() {
        let name = SourceName::parse("2026-01-28_Municipality_Commission_Meeting_-_01272026.txt");
        assert_eq!(name.date, NaiveDate::from_ymd_opt(2026, 1, 28));
        assert_eq!(name.body, "Commission Meeting");
    }

    #[test]
    fn parses_school_board_transcript_name() {
        let name = SourceName::parse("2026-01-27_SchoolBoard_Regular_Meeting_-_01272026.txt");
        assert_eq!(name.body, "Regular Meeting");
    }

    #[test]
    fn parses_minutes_shorthand_name() {
        let name = SourceName::parse("2026-01-27_mtleb_minutes_CM.txt");
        assert_eq!(name.date, NaiveDate::from_ymd_opt(2026, 1, 27));
        assert_eq!(name.body, "CM");
    }

    #[test]
    fn missing_date_prefix_yields_none() {
        let name = SourceName::parse("notes_about_something.txt");
        assert_eq!(name.date, None);
    }

    #[test]
    fn empty_body_falls_back_to_unknown() {
        let name = SourceName::parse("2026-01-27_mtleb_minutes_01272026.txt");
        assert_eq!(name.body, "Unknown Meeting");
    }

    #[test]
    fn multibyte_character_after_date_prefix_is_handled() {
        let name = SourceName::parse("2026-01-05é.txt");
        assert_eq!(name.date, NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(name.body, "é");

        let name = SourceName::parse("2026-01-05_Séance_Municipale.txt");
        assert_eq!(name.body, "Séance Municipale");
    }

    #[test]
    fn date_prefix_rejects_malformed_dates() {
        assert_eq!(date_prefix("2026-01-05_agenda.txt"), Some("2026-01-05"));
        assert_eq!(date_prefix("2026-13-99_agenda.txt"), None);
        assert_eq!(date_prefix("short.txt"), None);
    }
}
