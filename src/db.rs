use std::io::Read;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::calendar::parse_registration_date;
use crate::models::{FamilyRecord, RegistrationStatus};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFamily {
    pub family_name: String,
    pub registration_status: RegistrationStatus,
    pub input_date: NaiveDate,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

impl ImportSummary {
    /// Tallies the outcome of one insert: a returned id is a new family,
    /// no id means the row collided with an existing one.
    pub fn record(&mut self, inserted_id: Option<i64>) {
        match inserted_id {
            Some(_) => self.inserted += 1,
            None => self.duplicates += 1,
        }
    }

    pub fn rows(&self) -> usize {
        self.inserted + self.skipped + self.duplicates
    }
}

async fn insert_family(pool: &PgPool, family: &NewFamily) -> anyhow::Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        INSERT INTO families (family_name, registration_status, input_date, notes)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (family_name, input_date) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&family.family_name)
    .bind(family.registration_status.as_str())
    .bind(family.input_date)
    .bind(&family.notes)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.get("id")))
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let families = vec![
        (
            "김철수 & 이영희",
            RegistrationStatus::RegistrationComplete,
            NaiveDate::from_ymd_opt(2024, 8, 18).context("invalid date")?,
            "새가족 환영",
            vec![("김철수", "Chul-soo Kim", "husband"), ("이영희", "Young-hee Lee", "wife")],
        ),
        (
            "박민수",
            RegistrationStatus::Visitor,
            NaiveDate::from_ymd_opt(2024, 8, 11).context("invalid date")?,
            "첫 방문",
            vec![("박민수", "Min-soo Park", "husband")],
        ),
        (
            "정대현 & 최수진",
            RegistrationStatus::Visitor,
            NaiveDate::from_ymd_opt(2024, 8, 4).context("invalid date")?,
            "",
            vec![
                ("정대현", "Dae-hyun Jung", "husband"),
                ("최수진", "Soo-jin Choi", "wife"),
                ("정하은", "Ha-eun Jung", "child"),
            ],
        ),
        (
            "윤성호",
            RegistrationStatus::RegistrationComplete,
            NaiveDate::from_ymd_opt(2024, 7, 28).context("invalid date")?,
            "",
            vec![("윤성호", "Sung-ho Yoon", "husband")],
        ),
    ];

    for (name, status, input_date, notes, members) in families {
        let family = NewFamily {
            family_name: name.to_string(),
            registration_status: status,
            input_date,
            notes: notes.to_string(),
        };

        let Some(family_id) = insert_family(pool, &family).await? else {
            continue;
        };

        for (korean_name, english_name, relationship) in members {
            sqlx::query(
                r#"
                INSERT INTO members (family_id, korean_name, english_name, relationship)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(family_id)
            .bind(korean_name)
            .bind(english_name)
            .bind(relationship)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

/// Loads every family with its member count, newest registrations first.
pub async fn fetch_roster(pool: &PgPool) -> anyhow::Result<Vec<FamilyRecord>> {
    let records = sqlx::query(
        r#"
        SELECT f.id, f.family_name, f.registration_status, f.input_date,
               COUNT(m.id) AS member_count
        FROM families f
        LEFT JOIN members m ON m.family_id = f.id
        GROUP BY f.id
        ORDER BY f.input_date DESC, f.id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut families = Vec::with_capacity(records.len());

    for row in records {
        let status: String = row.get("registration_status");
        let member_count: i64 = row.get("member_count");
        families.push(FamilyRecord {
            id: row.get("id"),
            family_name: row.get("family_name"),
            registration_status: status.parse()?,
            registration_date: row.get("input_date"),
            member_count: usize::try_from(member_count).unwrap_or_default(),
        });
    }

    info!(families = families.len(), "loaded roster from database");
    Ok(families)
}

/// Parses import rows. Rows with a bad date or status are counted as
/// skipped and never returned.
pub fn read_family_csv<R: Read>(reader: R) -> anyhow::Result<(Vec<NewFamily>, usize)> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        family_name: String,
        registration_status: String,
        input_date: String,
        #[serde(default)]
        notes: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut families = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", index + 1))?;

        let parsed = parse_registration_date(&row.input_date).and_then(|input_date| {
            let status = row.registration_status.parse::<RegistrationStatus>()?;
            Ok((input_date, status))
        });

        match parsed {
            Ok((input_date, registration_status)) => families.push(NewFamily {
                family_name: row.family_name,
                registration_status,
                input_date,
                notes: row.notes.unwrap_or_default(),
            }),
            Err(err) => {
                warn!(
                    record = index + 1,
                    family = %row.family_name,
                    error = %err,
                    "skipping CSV record"
                );
                skipped += 1;
            }
        }
    }

    Ok((families, skipped))
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportSummary> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let (families, skipped) = read_family_csv(file)?;
    let mut summary = ImportSummary {
        skipped,
        ..ImportSummary::default()
    };

    for family in &families {
        summary.record(insert_family(pool, family).await?);
    }

    if summary.duplicates > 0 {
        info!(duplicates = summary.duplicates, "families already present were left unchanged");
    }

    Ok(summary)
}
