use std::io::Read;

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::models::{FamilyRecord, RawFamily};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFamily {
    pub id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct RosterLoad {
    pub families: Vec<FamilyRecord>,
    pub rejected: Vec<RejectedFamily>,
}

/// Converts wire families into roster records. Families whose
/// `input_date` does not parse are left out and reported in `rejected`.
pub fn roster_from_raw(raw: Vec<RawFamily>) -> RosterLoad {
    let mut load = RosterLoad::default();

    for family in raw {
        let id = family.id;
        match FamilyRecord::try_from(family) {
            Ok(record) => load.families.push(record),
            Err(err) => {
                warn!(
                    family_id = id,
                    error = %err,
                    "skipping family with unusable registration date"
                );
                load.rejected.push(RejectedFamily {
                    id,
                    reason: err.to_string(),
                });
            }
        }
    }

    load
}

pub fn roster_from_json<R: Read>(reader: R) -> Result<RosterLoad> {
    let raw: Vec<RawFamily> = serde_json::from_reader(reader)?;
    Ok(roster_from_raw(raw))
}
