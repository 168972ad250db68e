//! Time utilities: the business timezone decides what "today" is.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

pub fn parse_tz(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Calendar date at `now` in the given zone.
pub fn today_in(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_rolls_over_in_local_zone() {
        let now = Utc.with_ymd_and_hms(2025, 11, 30, 18, 30, 0).unwrap();
        let tz = parse_tz("Asia/Jakarta").unwrap();
        assert_eq!(today_in(now, tz), NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(today_in(now, chrono_tz::UTC), NaiveDate::from_ymd_opt(2025, 11, 30).unwrap());
    }

    #[test]
    fn bad_zone_is_an_error() {
        assert!(parse_tz("Mars/Olympus").is_err());
    }
}
