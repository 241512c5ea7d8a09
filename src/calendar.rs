//! Calendar bucketing on local calendar dates.
//!
//! Every bucket boundary and period key in the crate is derived from the
//! functions in this module. Dates are `NaiveDate`s taken from the local
//! calendar; nothing here normalises through UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            _ => Err(ReportError::InvalidGranularity {
                value: value.to_string(),
            }),
        }
    }
}

/// Today's date on the host's local calendar.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn minus_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn plus_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

/// The Sunday on or before `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    minus_days(date, u64::from(date.weekday().num_days_from_sunday()))
}

/// The Saturday closing the week that `date` falls in.
pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    plus_days(start_of_week(date), 6)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    start_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

pub fn period_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Week => start_of_week(date),
        Granularity::Month => start_of_month(date),
    }
}

pub fn period_end(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Week => end_of_week(date),
        Granularity::Month => end_of_month(date),
    }
}

/// Canonical key of the bucket holding `date`: the starting Sunday as
/// `YYYY-MM-DD` for weeks, `YYYY-MM` for months.
pub fn period_key(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Week => start_of_week(date).format("%Y-%m-%d").to_string(),
        Granularity::Month => format!("{:04}-{:02}", date.year(), date.month()),
    }
}

/// Parses a registration date. A trailing time component (`T...`) is
/// dropped, so both `2024-08-18` and `2024-08-18T00:00:00.000Z` yield the
/// same calendar day.
pub fn parse_registration_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| ReportError::InvalidDate {
        value: value.to_string(),
    })
}

pub fn period_key_for(value: &str, granularity: Granularity) -> Result<String> {
    let date = parse_registration_date(value)?;
    Ok(period_key(date, granularity))
}

/// Turns user input into the key of the period it names. Any date maps to
/// its bucket's key; under monthly granularity a bare `YYYY-MM` is also
/// accepted.
pub fn normalize_period_key(value: &str, granularity: Granularity) -> Result<String> {
    if granularity == Granularity::Month {
        let first_day = format!("{}-01", value.trim());
        if let Ok(date) = NaiveDate::parse_from_str(&first_day, "%Y-%m-%d") {
            return Ok(period_key(date, granularity));
        }
    }
    period_key_for(value, granularity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2024-08-14 is a Wednesday
        assert_eq!(start_of_week(date(2024, 8, 14)), date(2024, 8, 11));
        assert_eq!(end_of_week(date(2024, 8, 14)), date(2024, 8, 17));
        assert_eq!(start_of_week(date(2024, 8, 11)), date(2024, 8, 11));
        assert_eq!(start_of_week(date(2024, 8, 17)), date(2024, 8, 11));
    }

    #[test]
    fn week_can_span_year_boundary() {
        assert_eq!(start_of_week(date(2025, 1, 1)), date(2024, 12, 29));
        assert_eq!(period_key(date(2025, 1, 4), Granularity::Week), "2024-12-29");
    }

    #[test]
    fn month_bounds_respect_leap_years() {
        assert_eq!(end_of_month(date(2024, 2, 10)), date(2024, 2, 29));
        assert_eq!(end_of_month(date(2023, 2, 10)), date(2023, 2, 28));
        assert_eq!(end_of_month(date(2024, 12, 31)), date(2024, 12, 31));
        assert_eq!(end_of_month(date(2024, 4, 1)), date(2024, 4, 30));
        assert_eq!(start_of_month(date(2024, 4, 17)), date(2024, 4, 1));
    }

    #[test]
    fn keys_use_expected_shape() {
        assert_eq!(period_key(date(2024, 8, 14), Granularity::Week), "2024-08-11");
        assert_eq!(period_key(date(2024, 8, 14), Granularity::Month), "2024-08");
    }

    #[test]
    fn every_date_lies_inside_its_bucket() {
        let mut day = date(2023, 12, 1);
        while day <= date(2024, 3, 31) {
            for granularity in [Granularity::Week, Granularity::Month] {
                assert!(period_start(day, granularity) <= day);
                assert!(day <= period_end(day, granularity));
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn keys_partition_the_calendar() {
        let days: Vec<NaiveDate> = (0..70)
            .map(|offset| date(2024, 1, 20) + Days::new(offset))
            .collect();
        for granularity in [Granularity::Week, Granularity::Month] {
            for a in &days {
                for b in &days {
                    let same_key = period_key(*a, granularity) == period_key(*b, granularity);
                    let same_bucket = period_start(*a, granularity) <= *b
                        && *b <= period_end(*a, granularity);
                    assert_eq!(same_key, same_bucket, "{a} vs {b} ({granularity})");
                }
            }
        }
    }

    #[test]
    fn consecutive_buckets_tile_without_gaps() {
        let mut start = start_of_week(date(2024, 1, 1));
        for _ in 0..60 {
            let next = end_of_week(start).succ_opt().unwrap();
            assert_eq!(start_of_week(next), next);
            start = next;
        }

        let mut month = date(2023, 1, 1);
        for _ in 0..24 {
            let next = end_of_month(month).succ_opt().unwrap();
            assert_eq!(start_of_month(next), next);
            month = next;
        }
    }

    #[test]
    fn extreme_dates_do_not_panic() {
        for day in [NaiveDate::MIN, NaiveDate::MAX] {
            for granularity in [Granularity::Week, Granularity::Month] {
                let _ = period_key(day, granularity);
                let _ = period_start(day, granularity);
                let _ = period_end(day, granularity);
            }
        }
    }

    #[test]
    fn parses_plain_and_timestamped_dates() {
        assert_eq!(parse_registration_date("2024-08-18").unwrap(), date(2024, 8, 18));
        assert_eq!(
            parse_registration_date("2024-08-18T00:00:00.000Z").unwrap(),
            date(2024, 8, 18)
        );
        assert!(matches!(
            parse_registration_date("not a date"),
            Err(ReportError::InvalidDate { .. })
        ));
        assert!(parse_registration_date("2024-02-30").is_err());
        assert!(parse_registration_date("").is_err());
    }

    #[test]
    fn keys_from_strings_fail_fast_on_bad_input() {
        assert_eq!(period_key_for("2024-08-14", Granularity::Week).unwrap(), "2024-08-11");
        assert!(period_key_for("14/08/2024", Granularity::Month).is_err());
    }

    #[test]
    fn user_input_normalizes_to_period_keys() {
        assert_eq!(normalize_period_key("2024-08-14", Granularity::Week).unwrap(), "2024-08-11");
        assert_eq!(normalize_period_key("2024-08-11", Granularity::Week).unwrap(), "2024-08-11");
        assert_eq!(normalize_period_key("2024-08-14", Granularity::Month).unwrap(), "2024-08");
        assert_eq!(normalize_period_key(" 2024-08 ", Granularity::Month).unwrap(), "2024-08");
        assert!(normalize_period_key("2024-08", Granularity::Week).is_err());
        assert!(normalize_period_key("2024-13", Granularity::Month).is_err());
        assert!(normalize_period_key("last week", Granularity::Week).is_err());
    }

    #[test]
    fn granularity_parses_strictly() {
        assert_eq!("week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert_eq!(" Month ".parse::<Granularity>().unwrap(), Granularity::Month);
        assert!(matches!(
            "day".parse::<Granularity>(),
            Err(ReportError::InvalidGranularity { .. })
        ));
        assert_eq!(Granularity::Month.to_string(), "month");
    }
}
