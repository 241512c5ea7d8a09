use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::parse_registration_date;
use crate::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Visitor,
    #[serde(rename = "Registration Complete")]
    RegistrationComplete,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Visitor => "Visitor",
            RegistrationStatus::RegistrationComplete => "Registration Complete",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Visitor" => Ok(RegistrationStatus::Visitor),
            "Registration Complete" => Ok(RegistrationStatus::RegistrationComplete),
            _ => Err(ReportError::InvalidStatus {
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub id: i64,
    pub family_name: String,
    pub registration_status: RegistrationStatus,
    pub registration_date: NaiveDate,
    pub member_count: usize,
}

/// A family as returned by `GET /api/families`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFamily {
    pub id: i64,
    #[serde(default)]
    pub family_name: String,
    pub registration_status: RegistrationStatus,
    pub input_date: String,
    #[serde(default)]
    pub members: Vec<serde_json::Value>,
}

impl TryFrom<RawFamily> for FamilyRecord {
    type Error = ReportError;

    fn try_from(raw: RawFamily) -> Result<Self, Self::Error> {
        Ok(FamilyRecord {
            id: raw.id,
            registration_date: parse_registration_date(&raw.input_date)?,
            family_name: raw.family_name,
            registration_status: raw.registration_status,
            member_count: raw.members.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBucket {
    pub period_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub new_count: usize,
    pub cumulative_count: usize,
}

impl PeriodBucket {
    pub fn range(&self) -> PeriodRange {
        PeriodRange {
            start: self.period_start,
            end: self.period_end,
        }
    }
}
