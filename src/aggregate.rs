use std::collections::HashMap;

use chrono::{Days, Months, NaiveDate};
use tracing::debug;

use crate::calendar::{period_end, period_key, period_start, Granularity};
use crate::models::{FamilyRecord, PeriodBucket, PeriodRange};

/// Largest window a series will cover: a century of months.
pub const MAX_WINDOW_SIZE: i64 = 1200;

/// Builds `window_size` consecutive buckets ending with the one that holds
/// `reference_date`, oldest first.
///
/// `new_count` is the number of families registered inside the bucket.
/// `cumulative_count` is the number registered on or before the bucket's
/// last day, counted over the whole roster rather than just the window.
///
/// Windows longer than [`MAX_WINDOW_SIZE`] are cut down to it.
pub fn build_trailing_series(
    roster: &[FamilyRecord],
    granularity: Granularity,
    window_size: i64,
    reference_date: NaiveDate,
) -> Vec<PeriodBucket> {
    if window_size <= 0 {
        return Vec::new();
    }

    if window_size > MAX_WINDOW_SIZE {
        debug!(window_size, max = MAX_WINDOW_SIZE, "window size capped");
    }
    let window_size = window_size.min(MAX_WINDOW_SIZE);

    let mut dates: Vec<NaiveDate> = roster.iter().map(|f| f.registration_date).collect();
    dates.sort_unstable();

    let anchor = period_start(reference_date, granularity);
    let mut series = Vec::new();

    for back in 0..window_size {
        let Some(start) = step_back(anchor, granularity, back) else {
            debug!(
                granularity = %granularity,
                back,
                "window runs past the earliest representable date"
            );
            break;
        };
        let end = period_end(start, granularity);
        let through_end = dates.partition_point(|d| *d <= end);
        let before_start = dates.partition_point(|d| *d < start);

        series.push(PeriodBucket {
            period_key: period_key(start, granularity),
            period_start: start,
            period_end: end,
            new_count: through_end - before_start,
            cumulative_count: through_end,
        });
    }

    series.reverse();
    series
}

fn step_back(anchor: NaiveDate, granularity: Granularity, periods: i64) -> Option<NaiveDate> {
    let periods = u32::try_from(periods).ok()?;
    match granularity {
        Granularity::Week => anchor.checked_sub_days(Days::new(7 * u64::from(periods))),
        Granularity::Month => anchor.checked_sub_months(Months::new(periods)),
    }
}

pub fn buckets_by_key(series: &[PeriodBucket]) -> HashMap<String, PeriodRange> {
    series
        .iter()
        .map(|bucket| (bucket.period_key.clone(), bucket.range()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn family(id: i64, registered: NaiveDate) -> FamilyRecord {
        FamilyRecord {
            id,
            family_name: format!("Family {id}"),
            registration_status: RegistrationStatus::Visitor,
            registration_date: registered,
            member_count: 2,
        }
    }

    fn august_roster() -> Vec<FamilyRecord> {
        vec![
            family(1, date(2024, 8, 4)),
            family(2, date(2024, 8, 11)),
            family(3, date(2024, 8, 18)),
        ]
    }

    #[test]
    fn weekly_series_counts_new_and_cumulative() {
        let reference = date(2024, 8, 18);
        let series = build_trailing_series(&august_roster(), Granularity::Week, 3, reference);
        let keys: Vec<&str> = series.iter().map(|b| b.period_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-08-04", "2024-08-11", "2024-08-18"]);
        let new: Vec<usize> = series.iter().map(|b| b.new_count).collect();
        let total: Vec<usize> = series.iter().map(|b| b.cumulative_count).collect();
        assert_eq!(new, vec![1, 1, 1]);
        assert_eq!(total, vec![1, 2, 3]);
        assert_eq!(series[2].period_end, date(2024, 8, 24));
    }

    #[test]
    fn monthly_series_groups_the_whole_month() {
        let reference = date(2024, 8, 18);
        let series = build_trailing_series(&august_roster(), Granularity::Month, 2, reference);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].period_key, "2024-07");
        assert_eq!(series[0].new_count, 0);
        assert_eq!(series[1].period_key, "2024-08");
        assert_eq!(series[1].period_start, date(2024, 8, 1));
        assert_eq!(series[1].period_end, date(2024, 8, 31));
        assert_eq!(series[1].new_count, 3);
        assert_eq!(series[1].cumulative_count, 3);
    }

    #[test]
    fn empty_roster_yields_zeroed_buckets() {
        let series = build_trailing_series(&[], Granularity::Week, 6, date(2025, 3, 12));
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|b| b.new_count == 0 && b.cumulative_count == 0));
    }

    #[test]
    fn non_positive_window_is_empty() {
        let roster = august_roster();
        let reference = date(2024, 8, 18);
        assert!(build_trailing_series(&roster, Granularity::Week, 0, reference).is_empty());
        assert!(build_trailing_series(&roster, Granularity::Month, -3, reference).is_empty());
    }

    #[test]
    fn families_before_the_window_still_count_toward_totals() {
        let mut roster = august_roster();
        roster.push(family(4, date(2020, 1, 5)));
        roster.push(family(5, date(2030, 1, 5)));

        let series = build_trailing_series(&roster, Granularity::Week, 2, date(2024, 8, 18));
        assert_eq!(series[0].period_key, "2024-08-11");
        assert_eq!(series[0].new_count, 1);
        assert_eq!(series[0].cumulative_count, 3);
        assert_eq!(series[1].cumulative_count, 4);
    }

    #[test]
    fn cumulative_counts_never_decrease() {
        let roster: Vec<FamilyRecord> = (0..40)
            .map(|i| family(i, date(2023, 1, 1) + Days::new((i as u64 * 17) % 500)))
            .collect();
        for granularity in [Granularity::Week, Granularity::Month] {
            let series = build_trailing_series(&roster, granularity, 30, date(2024, 6, 1));
            assert_eq!(series.len(), 30);
            for pair in series.windows(2) {
                assert!(pair[0].cumulative_count <= pair[1].cumulative_count);
                assert!(pair[0].period_end < pair[1].period_start);
            }
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let roster = august_roster();
        let first = build_trailing_series(&roster, Granularity::Week, 26, date(2024, 8, 20));
        let second = build_trailing_series(&roster, Granularity::Week, 26, date(2024, 8, 20));
        assert_eq!(first, second);
    }

    #[test]
    fn oversized_windows_are_capped() {
        let reference = date(2024, 8, 18);
        for granularity in [Granularity::Week, Granularity::Month] {
            let series = build_trailing_series(&august_roster(), granularity, i64::MAX, reference);
            assert_eq!(series.len(), MAX_WINDOW_SIZE as usize);
            assert_eq!(series.last().unwrap().cumulative_count, 3);
        }
    }

    #[test]
    fn window_stops_at_the_calendar_floor() {
        let series = build_trailing_series(&[], Granularity::Month, 5, NaiveDate::MIN);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn lookup_exposes_bucket_ranges() {
        let reference = date(2024, 8, 18);
        let series = build_trailing_series(&august_roster(), Granularity::Week, 3, reference);
        let lookup = buckets_by_key(&series);
        assert_eq!(lookup.len(), 3);
        let range = lookup["2024-08-11"];
        assert_eq!(range.start, date(2024, 8, 11));
        assert_eq!(range.end, date(2024, 8, 17));
    }
}
