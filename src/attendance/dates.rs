//! Date token extraction and normalization for attendance rows.
//!
//! The portal mixes several date renderings in its table text; everything is
//! normalized to a canonical `DD-MM-YYYY` key. Rows whose date cannot be made
//! sense of keep their period counts but are left out of the date-indexed
//! maps.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Matches the date renderings observed in portal rows: "20 Aug, 2025",
/// "20 Aug 2025", "20-08-2025" / "20/08/2025", and year-less "20 Aug".
static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}\s[A-Za-z]{3},?\s\d{4}|\d{1,2}[-/]\d{1,2}[-/]\d{4}|\d{1,2}\s[A-Za-z]{3})")
        .expect("date token regex is valid")
});

/// Find a date substring in row text and normalize it to a `DD-MM-YYYY` key.
///
/// `reference_year` fills in for renderings that omit the year entirely.
pub fn extract_date_key(text: &str, reference_year: i32) -> Option<String> {
    let token = DATE_TOKEN.captures(text)?.get(1)?.as_str().trim().to_owned();
    parse_token(&token, reference_year).map(|date| date.format("%d-%m-%Y").to_string())
}

/// Parse a canonical `DD-MM-YYYY` key back into a date (for sorting and
/// calendar projection).
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let mut parts = key.splitn(3, '-');
    let day: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_token(token: &str, reference_year: i32) -> Option<NaiveDate> {
    if token.contains('-') || token.contains('/') {
        let normalized = token.replace('/', "-");
        return parse_date_key(&normalized);
    }

    // "20 Aug, 2025" / "20 Aug 2025" / "20 Aug"
    let cleaned = token.replace(',', "");
    let mut parts = cleaned.split_whitespace();
    let day: u32 = parts.next()?.parse().ok()?;
    let month = month_number(parts.next()?)?;
    let year: i32 = match parts.next() {
        Some(y) => y.parse().ok()?,
        None => reference_year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];
    let upper = abbrev.to_ascii_uppercase();
    MONTHS
        .iter()
        .position(|m| *m == upper)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: i32 = 2025;

    #[test]
    fn all_renderings_normalize_to_same_key() {
        for text in ["20 Aug, 2025", "20 Aug 2025", "20-08-2025", "20/08/2025"] {
            assert_eq!(
                extract_date_key(text, YEAR).as_deref(),
                Some("20-08-2025"),
                "failed for {text:?}"
            );
        }
    }

    #[test]
    fn yearless_rendering_uses_reference_year() {
        assert_eq!(extract_date_key("20 AUG", 2024).as_deref(), Some("20-08-2024"));
    }

    #[test]
    fn date_embedded_in_row_text_is_found() {
        assert_eq!(
            extract_date_key("1 3 SEP, 2025 P1 PRESENT", YEAR).as_deref(),
            Some("03-09-2025")
        );
    }

    #[test]
    fn uppercased_month_parses() {
        assert_eq!(
            extract_date_key("20 AUG, 2025", YEAR).as_deref(),
            Some("20-08-2025")
        );
    }

    #[test]
    fn invalid_calendar_dates_are_rejected() {
        assert_eq!(extract_date_key("32 Aug 2025", YEAR), None);
        assert_eq!(extract_date_key("31-02-2025", YEAR), None);
    }

    #[test]
    fn text_without_dates_yields_nothing() {
        assert_eq!(extract_date_key("P1 PRESENT LECTURE", YEAR), None);
    }

    #[test]
    fn canonical_keys_round_trip() {
        let date = parse_date_key("05-01-2025").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        assert_eq!(parse_date_key("not-a-date"), None);
    }
}
