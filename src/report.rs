use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{build_trailing_series, buckets_by_key};
use crate::calendar::Granularity;
use crate::models::{FamilyRecord, PeriodBucket, RegistrationStatus};
use crate::selection::{self, SelectionState};

pub const DEFAULT_WEEKLY_WINDOW: i64 = 26;
pub const DEFAULT_MONTHLY_WINDOW: i64 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub series: Vec<PeriodBucket>,
    pub filtered_roster: Vec<FamilyRecord>,
    pub selection: SelectionState,
}

/// Assembles the trailing series and the roster filtered by `selection`.
///
/// A selection made under a different granularity is discarded first,
/// since its keys name buckets of another shape.
pub fn build_report(
    roster: &[FamilyRecord],
    granularity: Granularity,
    selection: &SelectionState,
    window_size: i64,
    reference_date: NaiveDate,
) -> Report {
    let selection = if selection.granularity == granularity {
        selection.clone()
    } else {
        selection::switch_granularity(selection, granularity)
    };

    let series = build_trailing_series(roster, granularity, window_size, reference_date);
    let lookup = buckets_by_key(&series);
    let filtered_roster = selection::filter_roster(roster, &selection, &lookup);

    Report {
        series,
        filtered_roster,
        selection,
    }
}

/// Newest registrations first, ties broken by descending id.
pub fn sort_families_for_display(families: &[FamilyRecord]) -> Vec<FamilyRecord> {
    let mut sorted = families.to_vec();
    sorted.sort_by(|a, b| {
        b.registration_date
            .cmp(&a.registration_date)
            .then_with(|| b.id.cmp(&a.id))
    });
    sorted
}

pub fn series_for_display(series: &[PeriodBucket]) -> Vec<PeriodBucket> {
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| b.period_start.cmp(&a.period_start));
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewMode {
    Weekly,
    Monthly,
}

impl ViewMode {
    pub fn granularity(self) -> Granularity {
        match self {
            ViewMode::Weekly => Granularity::Week,
            ViewMode::Monthly => Granularity::Month,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Weekly => ViewMode::Monthly,
            ViewMode::Monthly => ViewMode::Weekly,
        }
    }
}

impl From<Granularity> for ViewMode {
    fn from(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Week => ViewMode::Weekly,
            Granularity::Month => ViewMode::Monthly,
        }
    }
}

/// Interactive state behind the registration dashboard.
#[derive(Debug, Clone)]
pub struct Dashboard {
    view: ViewMode,
    selection: SelectionState,
    weekly_window: i64,
    monthly_window: i64,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(ViewMode::Weekly)
    }
}

impl Dashboard {
    pub fn new(view: ViewMode) -> Self {
        Self {
            view,
            selection: SelectionState::new(view.granularity()),
            weekly_window: DEFAULT_WEEKLY_WINDOW,
            monthly_window: DEFAULT_MONTHLY_WINDOW,
        }
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn window_size(&self) -> i64 {
        match self.view {
            ViewMode::Weekly => self.weekly_window,
            ViewMode::Monthly => self.monthly_window,
        }
    }

    /// Resizes the window of the current view. Selected periods that fall
    /// outside the new window are dropped.
    pub fn set_window(&mut self, window_size: i64, reference_date: NaiveDate) {
        match self.view {
            ViewMode::Weekly => self.weekly_window = window_size,
            ViewMode::Monthly => self.monthly_window = window_size,
        }

        let series =
            build_trailing_series(&[], self.view.granularity(), window_size, reference_date);
        self.selection = selection::prune_stale(&self.selection, &buckets_by_key(&series));
    }

    pub fn toggle_view(&mut self) {
        self.view = self.view.toggled();
        self.selection = selection::switch_granularity(&self.selection, self.view.granularity());
    }

    pub fn select(&mut self, period_key: &str) {
        self.selection = selection::toggle(&self.selection, period_key);
    }

    /// Adds every key to the selection. Repeated keys stay selected.
    pub fn select_all<'a>(&mut self, period_keys: impl IntoIterator<Item = &'a str>) {
        for period_key in period_keys {
            self.selection = selection::include(&self.selection, period_key);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = selection::clear(&self.selection);
    }

    pub fn report(&self, roster: &[FamilyRecord], reference_date: NaiveDate) -> Report {
        build_report(
            roster,
            self.view.granularity(),
            &self.selection,
            self.window_size(),
            reference_date,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub by_status: BTreeMap<RegistrationStatus, usize>,
    pub families: usize,
    pub members: usize,
}

pub fn summarize_by_status(families: &[FamilyRecord]) -> StatusSummary {
    let mut by_status = BTreeMap::new();
    for family in families {
        *by_status.entry(family.registration_status).or_insert(0) += 1;
    }

    StatusSummary {
        by_status,
        families: families.len(),
        members: families.iter().map(|f| f.member_count).sum(),
    }
}

pub fn render_markdown(report: &Report, reference_date: NaiveDate) -> String {
    let mut output = String::new();
    let granularity = report.selection.granularity;
    let period_label = match granularity {
        Granularity::Week => "Week of",
        Granularity::Month => "Month",
    };

    let _ = writeln!(output, "# Family Registration Report");
    let _ = writeln!(
        output,
        "Generated {} ({} view, {} periods)",
        reference_date,
        granularity,
        report.series.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Registration Trend");

    if report.series.is_empty() {
        let _ = writeln!(output, "No periods in this window.");
    } else {
        for bucket in series_for_display(&report.series) {
            let marker = if report.selection.contains(&bucket.period_key) {
                " (selected)"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "- {} {}: {} new, {} total{}",
                period_label, bucket.period_key, bucket.new_count, bucket.cumulative_count, marker
            );
        }
    }

    let summary = summarize_by_status(&report.filtered_roster);
    let _ = writeln!(output);
    if report.selection.is_empty() {
        let _ = writeln!(output, "## All Families ({})", summary.families);
    } else {
        let keys: Vec<&str> = report.selection.selected.iter().map(String::as_str).collect();
        let _ = writeln!(
            output,
            "## Families from Selected Periods ({}): {}",
            summary.families,
            keys.join(", ")
        );
    }

    if summary.families == 0 {
        let _ = writeln!(output, "No families to list.");
        return output;
    }

    for (status, count) in &summary.by_status {
        let _ = writeln!(output, "- {status}: {count}");
    }
    let _ = writeln!(output, "- Members: {}", summary.members);
    let _ = writeln!(output);

    for family in sort_families_for_display(&report.filtered_roster) {
        let _ = writeln!(
            output,
            "- {} (#{}, {}) registered {} with {} members",
            family.family_name,
            family.id,
            family.registration_status,
            family.registration_date,
            family.member_count
        );
    }

    output
}
