use std::env;

use anyhow::Context;
use tracing::info;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    /// Reads database settings from the environment, after loading `.env`
    /// when one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        if dotenv::dotenv().is_ok() {
            info!("loaded settings from .env");
        }

        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: max_connections(env::var("DATABASE_MAX_CONNECTIONS").ok())?,
        })
    }
}

fn max_connections(value: Option<String>) -> anyhow::Result<u32> {
    match value {
        None => Ok(DEFAULT_MAX_CONNECTIONS),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|size| *size > 0)
            .with_context(|| {
                format!("DATABASE_MAX_CONNECTIONS must be a positive integer, got {raw:?}")
            }),
    }
}
