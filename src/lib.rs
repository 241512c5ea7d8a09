//! Registration statistics for a church family roster: calendar bucketing,
//! trailing weekly/monthly series, drill-down selection and report output.

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod roster;
pub mod selection;

pub use calendar::Granularity;
pub use error::ReportError;
pub use models::{FamilyRecord, PeriodBucket};
pub use report::{build_report, Dashboard, Report, ViewMode};
pub use selection::SelectionState;
