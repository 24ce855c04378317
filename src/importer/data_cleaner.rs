// ==========================================
// Beneficiary reconciliation - data cleaner
// ==========================================
// TRIM / NULL normalization / digit stripping / name folding /
// birthdate parsing
// ==========================================

use crate::importer::importer_trait::DataCleaner as DataCleanerTrait;
use chrono::{Datelike, NaiveDate};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Accepted birthdate layouts, tried in order
const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y", "%Y%m%d"];

/// `%Y` takes any width, so "01/02/15" would parse as year 15
const MIN_BIRTH_YEAR: i32 = 1900;

/// Values exporters write for "no value"
const NULL_MARKERS: [&str; 5] = ["NULL", "NONE", "N/A", "-", "#N/D"];

pub struct DataCleaner;

/// Accent-free uppercase form with punctuation turned into spaces and
/// whitespace collapsed. Shared by name matching and header lookup.
pub fn fold_text(value: &str) -> String {
    let stripped: String = value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if uppercase {
            collapsed.to_uppercase()
        } else {
            collapsed
        }
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty()
                || NULL_MARKERS
                    .iter()
                    .any(|marker| trimmed.eq_ignore_ascii_case(marker))
            {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn digits_only(&self, value: &str) -> String {
        value.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    fn fold_name(&self, value: &str) -> String {
        fold_text(value)
    }

    fn parse_birth_date(&self, value: &str, today: NaiveDate) -> Result<NaiveDate, &'static str> {
        // drop a trailing time part ("01/02/2015 00:00:00", "2015-02-01T00:00")
        let date_part = value
            .trim()
            .split(|c: char| c == ' ' || c == 'T')
            .next()
            .unwrap_or("");

        let parsed = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
            .filter(|date| date.year() >= MIN_BIRTH_YEAR)
            .ok_or("row.invalid_birth_date")?;

        if parsed > today {
            return Err("row.future_birth_date");
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_clean_text() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.clean_text("  Maria   da  Silva ", false), "Maria da Silva");
        assert_eq!(cleaner.clean_text(" escola municipal ", true), "ESCOLA MUNICIPAL");
    }

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ".to_string())), None);
        assert_eq!(cleaner.normalize_null(Some("null".to_string())), None);
        assert_eq!(cleaner.normalize_null(Some("#N/D".to_string())), None);
        assert_eq!(cleaner.normalize_null(None), None);
        assert_eq!(
            cleaner.normalize_null(Some(" 123 ".to_string())),
            Some("123".to_string())
        );
    }

    #[test]
    fn test_digits_only() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.digits_only("123.456.789-01"), "12345678901");
        assert_eq!(cleaner.digits_only(" 1 2 3 "), "123");
        assert_eq!(cleaner.digits_only("abc"), "");
    }

    #[test]
    fn test_fold_name() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.fold_name(" José  da   Silva "), "JOSE DA SILVA");
        assert_eq!(cleaner.fold_name("Conceição D'Ávila"), "CONCEICAO D AVILA");
        assert_eq!(cleaner.fold_name("joão"), cleaner.fold_name("JOAO"));
    }

    #[test]
    fn test_parse_birth_date_formats() {
        let cleaner = DataCleaner;
        let expected = NaiveDate::from_ymd_opt(2015, 2, 1).unwrap();
        for raw in [
            "01/02/2015",
            "2015-02-01",
            "01-02-2015",
            "01.02.2015",
            "20150201",
            "01/02/2015 00:00:00",
            "2015-02-01T10:30:00",
        ] {
            assert_eq!(cleaner.parse_birth_date(raw, today()), Ok(expected), "{}", raw);
        }
    }

    #[test]
    fn test_parse_birth_date_rejects() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.parse_birth_date("31/02/2015", today()),
            Err("row.invalid_birth_date")
        );
        assert_eq!(
            cleaner.parse_birth_date("ontem", today()),
            Err("row.invalid_birth_date")
        );
        // two-digit years
        assert_eq!(
            cleaner.parse_birth_date("01/02/15", today()),
            Err("row.invalid_birth_date")
        );
        assert_eq!(
            cleaner.parse_birth_date("15-02-01", today()),
            Err("row.invalid_birth_date")
        );
        assert_eq!(
            cleaner.parse_birth_date("16/06/2024", today()),
            Err("row.future_birth_date")
        );
    }
}
