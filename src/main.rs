use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use church_roster_report::aggregate::{build_trailing_series, buckets_by_key, MAX_WINDOW_SIZE};
use church_roster_report::calendar::{
    self, normalize_period_key, parse_registration_date, Granularity,
};
use church_roster_report::config::Config;
use church_roster_report::models::FamilyRecord;
use church_roster_report::report::{self, Dashboard};
use church_roster_report::{db, roster, selection};

#[derive(Parser)]
#[command(name = "roster-report")]
#[command(about = "Family registration statistics for the church roster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample families
    Seed,
    /// Import families from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print new and cumulative registrations per period
    Series {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Generate a registration report, optionally drilled down to periods
    Report {
        #[command(flatten)]
        view: ViewArgs,
        /// Period to drill into, as a period key or any date inside it
        /// (repeat to select several)
        #[arg(long = "select")]
        select: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ViewArgs {
    #[arg(long, default_value = "week")]
    granularity: Granularity,
    /// Number of periods to show; defaults to 26 weeks or 12 months
    #[arg(
        long,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(i64).range(..=MAX_WINDOW_SIZE)
    )]
    window: Option<i64>,
    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_registration_date)]
    as_of: Option<NaiveDate>,
    /// Read the roster from a JSON export instead of the database
    #[arg(long)]
    roster_json: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let summary = db::import_csv(&pool, &csv).await?;
            println!(
                "Inserted {} families from {} ({} skipped, {} already present).",
                summary.inserted,
                csv.display(),
                summary.skipped,
                summary.duplicates
            );
        }
        Commands::Series { view } => {
            let families = load_roster(view.roster_json.as_deref()).await?;
            let as_of = view.as_of.unwrap_or_else(calendar::today);
            let dashboard = dashboard_for(&view, as_of);
            let series = build_trailing_series(
                &families,
                view.granularity,
                dashboard.window_size(),
                as_of,
            );

            if series.is_empty() {
                println!("No periods in this window.");
                return Ok(());
            }

            println!("Registrations by {} (as of {as_of}):", view.granularity);
            for bucket in report::series_for_display(&series) {
                println!(
                    "- {} ({} to {}): {} new, {} total",
                    bucket.period_key,
                    bucket.period_start,
                    bucket.period_end,
                    bucket.new_count,
                    bucket.cumulative_count
                );
            }
        }
        Commands::Report {
            view,
            select,
            format,
            out,
        } => {
            let families = load_roster(view.roster_json.as_deref()).await?;
            let as_of = view.as_of.unwrap_or_else(calendar::today);
            let mut dashboard = dashboard_for(&view, as_of);
            let keys = select
                .iter()
                .map(|value| normalize_period_key(value, view.granularity))
                .collect::<Result<Vec<_>, _>>()
                .context("invalid --select value")?;
            dashboard.select_all(keys.iter().map(String::as_str));
            let built = dashboard.report(&families, as_of);

            let lookup = buckets_by_key(&built.series);
            let current = selection::prune_stale(&built.selection, &lookup);
            for key in built.selection.selected.difference(&current.selected) {
                warn!(
                    period = %key,
                    "selected period is outside the current window and matches no families"
                );
            }

            let rendered = match format {
                OutputFormat::Markdown => report::render_markdown(&built, as_of),
                OutputFormat::Json => serde_json::to_string_pretty(&built)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let config = Config::from_env()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_roster(roster_json: Option<&std::path::Path>) -> anyhow::Result<Vec<FamilyRecord>> {
    let Some(path) = roster_json else {
        let pool = connect().await?;
        return db::fetch_roster(&pool).await;
    };

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let load = roster::roster_from_json(BufReader::new(file))
        .with_context(|| format!("failed to read roster from {}", path.display()))?;
    if !load.rejected.is_empty() {
        warn!(rejected = load.rejected.len(), "some families were left out of the report");
    }
    info!(families = load.families.len(), path = %path.display(), "loaded roster from file");
    Ok(load.families)
}

fn dashboard_for(view: &ViewArgs, as_of: NaiveDate) -> Dashboard {
    let mut dashboard = Dashboard::new(view.granularity.into());
    if let Some(window) = view.window {
        dashboard.set_window(window, as_of);
    }
    dashboard
}
