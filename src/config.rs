use crate::domain::BoundingBox;
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OVERPASS_ENDPOINTS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://maps.mail.ru/osm/tools/overpass/api/interpreter",
];

// roughly the Pune municipal limits
const DEFAULT_BBOX: &str = "18.40,73.74,18.64,74.00";

#[derive(Clone, Debug)]
pub struct ImportConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub fetch: FetchConfig,
    pub skip_road_fetch: bool,
    pub backfill: BackfillSettings,
    pub reset_distances: bool,
}

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub endpoints: Vec<String>,
    pub rounds: u32,
    pub round_delay: Duration,
    pub timeout: Duration,
    pub bbox: BoundingBox,
}

/// Knobs for the distance backfill loop.
#[derive(Clone, Debug, PartialEq)]
pub struct BackfillSettings {
    pub radius_m: f64,
    pub batch_size: u32,
    pub sentinel: f64,
    pub batch_pause: Duration,
    pub max_empty_batches: u32,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            radius_m: 100.0,
            batch_size: 5000,
            sentinel: 999.0,
            batch_pause: Duration::from_millis(50),
            max_empty_batches: 3,
        }
    }
}

impl BackfillSettings {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("BACKFILL_BATCH_SIZE must be at least 1");
        }
        if self.max_empty_batches == 0 {
            bail!("BACKFILL_MAX_EMPTY_BATCHES must be at least 1");
        }
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            bail!("ROAD_SEARCH_RADIUS_M must be a positive number");
        }
        // a sentinel inside the radius would be indistinguishable from a real distance
        if !(self.sentinel.is_finite() && self.sentinel > self.radius_m) {
            bail!(
                "NO_ROAD_SENTINEL ({}) must be greater than ROAD_SEARCH_RADIUS_M ({})",
                self.sentinel,
                self.radius_m
            );
        }
        Ok(())
    }
}

impl ImportConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("Failed to determine DATABASE_URL from environment variables")?;

        let max_connections = env_or("MAX_CONNECTIONS", 5)?;

        let endpoints: Vec<String> = match std::env::var("OVERPASS_ENDPOINTS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            Err(_) => DEFAULT_OVERPASS_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        if endpoints.is_empty() {
            bail!("OVERPASS_ENDPOINTS must name at least one endpoint");
        }

        let bbox: BoundingBox = std::env::var("IMPORT_BBOX")
            .unwrap_or_else(|_| DEFAULT_BBOX.to_string())
            .parse()
            .context("Failed to parse IMPORT_BBOX")?;

        let fetch = FetchConfig {
            endpoints,
            rounds: env_or("OVERPASS_ROUNDS", 3)?,
            round_delay: Duration::from_secs(env_or("OVERPASS_ROUND_DELAY_SECS", 10)?),
            timeout: Duration::from_secs(env_or("OVERPASS_TIMEOUT_SECS", 180)?),
            bbox,
        };
        if fetch.rounds == 0 {
            bail!("OVERPASS_ROUNDS must be at least 1");
        }

        let defaults = BackfillSettings::default();
        let backfill = BackfillSettings {
            radius_m: env_or("ROAD_SEARCH_RADIUS_M", defaults.radius_m)?,
            batch_size: env_or("BACKFILL_BATCH_SIZE", defaults.batch_size)?,
            sentinel: env_or("NO_ROAD_SENTINEL", defaults.sentinel)?,
            batch_pause: Duration::from_millis(env_or("BACKFILL_PAUSE_MS", 50)?),
            max_empty_batches: env_or("BACKFILL_MAX_EMPTY_BATCHES", defaults.max_empty_batches)?,
        };
        backfill.validate()?;

        Ok(Self {
            database_url,
            max_connections,
            fetch,
            skip_road_fetch: env_or("SKIP_ROAD_FETCH", false)?,
            backfill,
            reset_distances: env_or("BACKFILL_RESET", true)?,
        })
    }
}

// unset falls back to the default, set-but-garbage is an error
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e)),
        Err(_) => Ok(default),
    }
}
