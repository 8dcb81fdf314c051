//! Explicit run configuration. Every knob the jobs used to pull from the
//! process environment lives here as a named, validated field; `from_env`
//! exists for deployments that still configure through the environment.

use crate::types::bounding_box::{BoundingBox, GridSpec, WORLD};
use crate::types::data_kind::DataKind;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Collection holding the station entities shared by every report kind.
pub const STATIONS_COLLECTION: &str = "awc-stations";

/// 30 days, the observed cache-feed retention.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Metadata plus header lines at the top of the cache CSV files.
pub const DEFAULT_SKIP_LINES: usize = 6;
pub const DEFAULT_FEED_BASE_URL: &str = "https://aviationweather.gov/data/cache";
pub const DEFAULT_DB_URL: &str = "mongodb://127.0.0.1:27017/awc";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Connection string handed to the document-store binding.
    pub db_url: String,
    /// Stored records expire this long after their observation time.
    pub ttl: Duration,
    /// Which report feed to ingest.
    pub kind: DataKind,
    /// Geographic extent of interest.
    pub bbox: BoundingBox,
    /// Optional grid sharding the extent into serial ingestion units.
    pub grid: Option<GridSpec>,
    /// Write the grid footprint GeoJSON artifact after a run.
    pub write_footprint: bool,
    /// Records per upsert batch.
    pub chunk_size: usize,
    /// Lines to skip at the top of the report CSV before the data rows.
    pub skip_lines: usize,
    pub feed_base_url: String,
    /// Where feed artifacts and the footprint file land.
    pub output_dir: PathBuf,
    /// Prefix applied to every station identifier in a run. All lookups use
    /// the same convention, so it must not change between station and report
    /// syncs against the same store.
    pub station_prefix: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            ttl: DEFAULT_TTL,
            kind: DataKind::Metars,
            bbox: WORLD,
            grid: None,
            write_footprint: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_lines: DEFAULT_SKIP_LINES,
            feed_base_url: DEFAULT_FEED_BASE_URL.to_string(),
            output_dir: PathBuf::from("./output"),
            station_prefix: "#".to_string(),
        }
    }
}

impl IngestConfig {
    /// Reads `DB_URL`, `TTL`, `DATA`, `BBOX`, `GRID`, `FOOTPRINT`,
    /// `CHUNK_SIZE` and `OUTPUT_DIR`, falling back to defaults for unset
    /// variables. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(url) = env::var("DB_URL") {
            config.db_url = url;
        }
        if let Ok(raw) = env::var("TTL") {
            let seconds: u64 = raw
                .parse()
                .map_err(|e| ConfigError::invalid("TTL", &raw, e))?;
            config.ttl = Duration::from_secs(seconds);
        }
        if let Ok(raw) = env::var("DATA") {
            config.kind = raw
                .parse()
                .map_err(|e| ConfigError::invalid("DATA", &raw, e))?;
        }
        if let Ok(raw) = env::var("BBOX") {
            config.bbox = raw
                .parse()
                .map_err(|e| ConfigError::invalid("BBOX", &raw, e))?;
        }
        if let Ok(raw) = env::var("GRID") {
            config.grid = Some(
                raw.parse()
                    .map_err(|e| ConfigError::invalid("GRID", &raw, e))?,
            );
        }
        if let Ok(raw) = env::var("FOOTPRINT") {
            config.write_footprint = matches!(raw.as_str(), "1" | "true" | "yes");
        }
        if let Ok(raw) = env::var("CHUNK_SIZE") {
            config.chunk_size = raw
                .parse()
                .map_err(|e| ConfigError::invalid("CHUNK_SIZE", &raw, e))?;
        }
        if let Ok(dir) = env::var("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::Zero { name: "TTL" });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Zero { name: "CHUNK_SIZE" });
        }
        if self.db_url.is_empty() {
            return Err(ConfigError::invalid("DB_URL", "", "must not be empty"));
        }
        if self.feed_base_url.is_empty() {
            return Err(ConfigError::invalid(
                "feed_base_url",
                "",
                "must not be empty",
            ));
        }
        Ok(())
    }
}
