//! The shared mutable state one ingestion unit threads through its stages.

use crate::config::IngestConfig;
use crate::feeds::decode::{RawStation, ReportRow};
use crate::feeds::fetch::FeedClient;
use crate::stations::resolver::StationResolver;
use crate::store::{DocumentStore, UpsertOutcome};
use crate::sync::last_known::LastKnownTimes;
use crate::types::bounding_box::BoundingBox;
use crate::types::data_kind::DataKind;
use crate::types::feature::Feature;
use std::sync::Arc;

/// One serially-processed slice of a run: a grid cell, or the whole
/// configured extent when no grid is set.
#[derive(Debug, Clone, Copy)]
pub struct IngestionUnit {
    pub index: usize,
    pub bbox: BoundingBox,
}

/// Counters reported once per run; units merge into it as they finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub units: usize,
    pub rows_total: usize,
    pub rows_valid: usize,
    pub rows_skipped: usize,
    pub rows_out_of_bounds: usize,
    pub new_records: usize,
    pub reports: UpsertOutcome,
    pub stations: UpsertOutcome,
}

impl RunReport {
    pub fn merge(&mut self, other: &RunReport) {
        self.units += other.units;
        self.rows_total += other.rows_total;
        self.rows_valid += other.rows_valid;
        self.rows_skipped += other.rows_skipped;
        self.rows_out_of_bounds += other.rows_out_of_bounds;
        self.new_records += other.new_records;
        self.reports.absorb(other.reports);
        self.stations.absorb(other.stations);
    }
}

pub struct Context {
    pub kind: DataKind,
    pub unit: IngestionUnit,
    pub config: Arc<IngestConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub feed: Arc<FeedClient>,
    pub stations: Arc<StationResolver>,
    /// Dedup baseline, filled by the read-last-known stage.
    pub most_recent: LastKnownTimes,
    /// Decompressed feed bytes between fetch and decode.
    pub payload: Option<Vec<u8>>,
    pub rows: Vec<ReportRow>,
    pub raw_stations: Vec<RawStation>,
    /// The current record set, rewritten by each stage in turn.
    pub data: Vec<Feature>,
    pub report: RunReport,
}

impl Context {
    pub fn new(
        kind: DataKind,
        unit: IngestionUnit,
        config: Arc<IngestConfig>,
        store: Arc<dyn DocumentStore>,
        feed: Arc<FeedClient>,
        stations: Arc<StationResolver>,
    ) -> Self {
        Self {
            kind,
            unit,
            config,
            store,
            feed,
            stations,
            most_recent: LastKnownTimes::new(),
            payload: None,
            rows: Vec::new(),
            raw_stations: Vec::new(),
            data: Vec::new(),
            report: RunReport {
                units: 1,
                ..RunReport::default()
            },
        }
    }
}
