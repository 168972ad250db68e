//! Statement period resolution: "NOVEMBER 2025" -> 2025-11-01 ..= 2025-11-30.

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementPeriod {
    /// Label as printed, normalized to "<MONTH> <YEAR>".
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl StatementPeriod {
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start_date..=self.end_date).contains(&date)
    }
}

fn month_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([A-Z]{3,9})\.?\s+(\d{4})\b").expect("month-year regex")
    })
}

/// Month number for English and Indonesian month names and their
/// three-letter abbreviations.
pub fn month_from_name(name: &str) -> Option<u32> {
    let m = match name.to_ascii_uppercase().as_str() {
        "JANUARY" | "JANUARI" | "JAN" => 1,
        "FEBRUARY" | "FEBRUARI" | "FEB" => 2,
        "MARCH" | "MARET" | "MAR" => 3,
        "APRIL" | "APR" => 4,
        "MAY" | "MEI" => 5,
        "JUNE" | "JUNI" | "JUN" => 6,
        "JULY" | "JULI" | "JUL" => 7,
        "AUGUST" | "AGUSTUS" | "AUG" | "AGU" | "AGS" => 8,
        "SEPTEMBER" | "SEP" | "SEPT" => 9,
        "OCTOBER" | "OKTOBER" | "OCT" | "OKT" => 10,
        "NOVEMBER" | "NOV" => 11,
        "DECEMBER" | "DESEMBER" | "DEC" | "DES" => 12,
        _ => return None,
    };
    Some(m)
}

/// Last calendar day of a month: first day of the next month minus one day.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next - Duration::days(1))
}

/// Find the first "<month name> <year>" in `text` and resolve it.
pub fn resolve_period(text: &str) -> Option<StatementPeriod> {
    for caps in month_year_re().captures_iter(text) {
        let Some(month) = month_from_name(&caps[1]) else { continue };
        let Ok(year) = caps[2].parse::<i32>() else { continue };
        let Some(start_date) = NaiveDate::from_ymd_opt(year, month, 1) else { continue };
        let Some(end_date) = last_day_of_month(year, month) else { continue };
        return Some(StatementPeriod {
            label: format!("{} {}", caps[1].to_ascii_uppercase(), year),
            start_date,
            end_date,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_end_is_exact_for_every_month() {
        let expected = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (i, days) in expected.iter().enumerate() {
            let month = i as u32 + 1;
            assert_eq!(last_day_of_month(2025, month), Some(ymd(2025, month, *days)));
        }
    }

    #[test]
    fn february_follows_leap_years() {
        assert_eq!(resolve_period("PERIODE : FEBRUARY 2024").unwrap().end_date, ymd(2024, 2, 29));
        assert_eq!(resolve_period("PERIODE : FEBRUARY 2025").unwrap().end_date, ymd(2025, 2, 28));
        assert_eq!(resolve_period("PERIOD FEB 2000").unwrap().end_date, ymd(2000, 2, 29));
        assert_eq!(resolve_period("PERIOD FEB 1900").unwrap().end_date, ymd(1900, 2, 28));
    }

    #[test]
    fn indonesian_names_resolve() {
        let p = resolve_period("PERIODE : DESEMBER 2025").unwrap();
        assert_eq!(p.label, "DESEMBER 2025");
        assert_eq!(p.start_date, ymd(2025, 12, 1));
        assert_eq!(p.end_date, ymd(2025, 12, 31));
    }

    #[test]
    fn skips_words_that_are_not_months() {
        let p = resolve_period("HALAMAN 2025 TAHUN 2024 periode November 2025").unwrap();
        assert_eq!(p.label, "NOVEMBER 2025");
        assert!(p.contains(ymd(2025, 11, 30)));
        assert!(!p.contains(ymd(2025, 12, 1)));
        assert!(resolve_period("no period here").is_none());
    }
}
