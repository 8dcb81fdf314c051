//! The two report feeds the cache publishes, and the names that hang off
//! them: feed file, output artifact, target collection and time field.

use crate::types::feature::FeatureKind;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which report feed an ingestion run consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// METAR observations.
    Metars,
    /// TAF forecasts.
    Tafs,
}

impl DataKind {
    /// Compressed feed file name under the cache base URL.
    pub fn feed_file(&self) -> &'static str {
        match self {
            DataKind::Metars => "metars.cache.csv.gz",
            DataKind::Tafs => "tafs.cache.csv.gz",
        }
    }

    /// Decompressed artifact name in the output directory.
    pub fn artifact_file(&self) -> &'static str {
        match self {
            DataKind::Metars => "metars.csv",
            DataKind::Tafs => "tafs.csv",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            DataKind::Metars => "awc-metars",
            DataKind::Tafs => "awc-tafs",
        }
    }

    pub fn feature_kind(&self) -> FeatureKind {
        match self {
            DataKind::Metars => FeatureKind::Observation,
            DataKind::Tafs => FeatureKind::Forecast,
        }
    }

    /// Property name under which the normalizer records the raw timestamp:
    /// observation time for METARs, issue time for TAFs.
    pub fn time_property(&self) -> &'static str {
        match self {
            DataKind::Metars => "obsTime",
            DataKind::Tafs => "issueTime",
        }
    }

    /// Dotted document path of the raw timestamp, for transform rules.
    pub fn time_path(&self) -> &'static str {
        match self {
            DataKind::Metars => "properties.obsTime",
            DataKind::Tafs => "properties.issueTime",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataKind::Metars => "metars",
            DataKind::Tafs => "tafs",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown data kind '{0}', expected 'metars' or 'tafs'")]
pub struct DataKindError(String);

impl FromStr for DataKind {
    type Err = DataKindError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "metar" | "metars" => Ok(DataKind::Metars),
            "taf" | "tafs" => Ok(DataKind::Tafs),
            _ => Err(DataKindError(raw.to_string())),
        }
    }
}
