use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::calendar::Granularity;
use crate::models::{FamilyRecord, PeriodRange};

/// Periods picked for drill-down. Transitions return a new state and
/// leave the caller's value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub granularity: Granularity,
    pub selected: BTreeSet<String>,
}

impl SelectionState {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            selected: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, period_key: &str) -> bool {
        self.selected.contains(period_key)
    }
}

pub fn toggle(selection: &SelectionState, period_key: &str) -> SelectionState {
    let mut next = selection.clone();
    if !next.selected.remove(period_key) {
        next.selected.insert(period_key.to_string());
    }
    next
}

/// Adds `period_key` without toggling; selecting a key twice keeps it.
pub fn include(selection: &SelectionState, period_key: &str) -> SelectionState {
    let mut next = selection.clone();
    next.selected.insert(period_key.to_string());
    next
}

pub fn clear(selection: &SelectionState) -> SelectionState {
    SelectionState::new(selection.granularity)
}

pub fn switch_granularity(_selection: &SelectionState, granularity: Granularity) -> SelectionState {
    SelectionState::new(granularity)
}

/// Drops keys that no longer name a bucket in the current window.
pub fn prune_stale(
    selection: &SelectionState,
    buckets_by_key: &HashMap<String, PeriodRange>,
) -> SelectionState {
    SelectionState {
        granularity: selection.granularity,
        selected: selection
            .selected
            .iter()
            .filter(|key| buckets_by_key.contains_key(key.as_str()))
            .cloned()
            .collect(),
    }
}

/// Families registered inside any selected period, in roster order. An
/// empty selection means no filter and returns the whole roster. Keys
/// missing from `buckets_by_key` match nothing.
pub fn filter_roster(
    roster: &[FamilyRecord],
    selection: &SelectionState,
    buckets_by_key: &HashMap<String, PeriodRange>,
) -> Vec<FamilyRecord> {
    if selection.is_empty() {
        return roster.to_vec();
    }

    let ranges: Vec<PeriodRange> = selection
        .selected
        .iter()
        .filter_map(|key| buckets_by_key.get(key).copied())
        .collect();

    roster
        .iter()
        .filter(|family| ranges.iter().any(|range| range.contains(family.registration_date)))
        .cloned()
        .collect()
}
