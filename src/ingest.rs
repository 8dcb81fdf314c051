//! The main entry point for running ingestion jobs against a document
//! store: station-table syncs, incremental report syncs, and the optional
//! grid footprint artifact.

use crate::config::{IngestConfig, STATIONS_COLLECTION};
use crate::error::AwcIngestError;
use crate::feeds::fetch::FeedClient;
use crate::normalize::station_features_from_documents;
use crate::pipeline::stages::{
    ClearData, DecodeReports, DecodeStations, FetchReports, FetchStations, FilterNew,
    NormalizeReports, NormalizeStations, ReadLastKnown, UpdateStations, WriteReports,
    WriteStations,
};
use crate::pipeline::{Context, IngestionUnit, Pipeline, RunReport, StageRegistry};
use crate::stations::resolver::StationResolver;
use crate::store::{DocumentStore, IndexSpec, SortOrder};
use crate::types::bounding_box::footprint_collection;
use crate::types::data_kind::DataKind;
use crate::types::field_path::{FieldPath, FieldPathError};
use bon::bon;
use log::{info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::task;

const FOOTPRINT_FILE: &str = "footprint.geojson";

/// Measurement properties carried by report records; each gets its own
/// index plus a per-station compound.
const MEASUREMENT_PROPERTIES: [&str; 7] = [
    "temperature",
    "dewpoint",
    "windSpeed",
    "windDirection",
    "windGust",
    "cloudCover",
    "visibility",
];

fn data_collection_indices(
    ttl: std::time::Duration,
) -> Result<Vec<IndexSpec>, FieldPathError> {
    let icao = FieldPath::parse("properties.icao")?;
    let time = FieldPath::parse("time")?;
    let mut indices = vec![
        IndexSpec::unique(FieldPath::parse("properties.key")?),
        IndexSpec::ascending(icao.clone()),
        IndexSpec::compound(
            vec![(icao.clone(), SortOrder::Ascending), (time.clone(), SortOrder::Descending)],
            true,
        ),
    ];
    for property in MEASUREMENT_PROPERTIES {
        indices.push(IndexSpec::compound(
            vec![
                (icao.clone(), SortOrder::Ascending),
                (
                    FieldPath::parse(&format!("properties.{property}"))?,
                    SortOrder::Ascending,
                ),
                (time.clone(), SortOrder::Descending),
            ],
            true,
        ));
    }
    for property in MEASUREMENT_PROPERTIES {
        indices.push(IndexSpec::ascending(FieldPath::parse(&format!(
            "properties.{property}"
        ))?));
    }
    indices.push(IndexSpec::Ttl {
        path: time,
        expire_after: ttl,
    });
    indices.push(IndexSpec::Geo2dSphere {
        path: FieldPath::parse("geometry")?,
    });
    Ok(indices)
}

fn station_collection_indices() -> Result<Vec<IndexSpec>, FieldPathError> {
    Ok(vec![
        IndexSpec::unique(FieldPath::parse("properties.icao")?),
        IndexSpec::Geo2dSphere {
            path: FieldPath::parse("geometry")?,
        },
    ])
}

/// An ingestion client bound to one configuration and one document store.
///
/// # Examples
///
/// ```no_run
/// # use awc_ingest::{AwcIngest, AwcIngestError, IngestConfig, MemoryStore};
/// # use std::sync::Arc;
/// # async fn run() -> Result<(), AwcIngestError> {
/// let client = AwcIngest::new(IngestConfig::default(), Arc::new(MemoryStore::new()))?;
/// client.sync_stations().await?;
/// let report = client.sync_reports().call().await?;
/// println!("{} new records", report.new_records);
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct AwcIngest {
    config: Arc<IngestConfig>,
    store: Arc<dyn DocumentStore>,
    feed: Arc<FeedClient>,
    registry: StageRegistry,
}

#[bon]
impl AwcIngest {
    /// Validates the configuration and binds the client to `store`.
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, AwcIngestError> {
        config.validate()?;
        let feed = Arc::new(FeedClient::new(&config.feed_base_url, &config.output_dir));
        let mut registry = StageRegistry::new();
        registry.register(Arc::new(ReadLastKnown));
        registry.register(Arc::new(FetchReports));
        registry.register(Arc::new(DecodeReports));
        registry.register(Arc::new(NormalizeReports));
        registry.register(Arc::new(FilterNew));
        registry.register(Arc::new(WriteReports));
        registry.register(Arc::new(UpdateStations));
        registry.register(Arc::new(FetchStations));
        registry.register(Arc::new(DecodeStations));
        registry.register(Arc::new(NormalizeStations));
        registry.register(Arc::new(WriteStations));
        registry.register(Arc::new(ClearData));
        Ok(Self {
            config: Arc::new(config),
            store,
            feed,
            registry,
        })
    }

    /// Creates the data and station collections with their index sets;
    /// idempotent, called automatically by the sync methods.
    pub async fn ensure_collections(&self, kind: DataKind) -> Result<(), AwcIngestError> {
        self.store
            .create_collection(kind.collection(), &data_collection_indices(self.config.ttl)?)
            .await?;
        self.store
            .create_collection(STATIONS_COLLECTION, &station_collection_indices()?)
            .await?;
        Ok(())
    }

    /// Fetches the station metadata feed and upserts the station table.
    pub async fn sync_stations(&self) -> Result<RunReport, AwcIngestError> {
        self.ensure_collections(self.config.kind).await?;
        let pipeline = self.pipeline_from(&[
            "fetch-stations",
            "decode-stations",
            "normalize-stations",
            "write-stations",
        ])?;
        let mut context = self.context(self.config.kind, self.whole_extent(), Arc::default());
        let mut report = RunReport::default();
        pipeline.run(&mut context).await?;
        report.merge(&context.report);
        info!(
            "Station sync: {} stations upserted over {} entries",
            report.stations.total(),
            report.rows_total
        );
        Ok(report)
    }

    /// Runs one incremental report sync: per serial ingestion unit, read the
    /// dedup baseline, fetch and decode the feed, normalize against the
    /// station table, drop already-known records, and upsert the rest in
    /// chunks. Station entities are refreshed as a side effect.
    ///
    /// # Arguments
    ///
    /// * `.kind(DataKind)`: Optional. Overrides the configured feed kind.
    #[builder]
    pub async fn sync_reports(
        &self,
        kind: Option<DataKind>,
    ) -> Result<RunReport, AwcIngestError> {
        let kind = kind.unwrap_or(self.config.kind);
        self.ensure_collections(kind).await?;
        let resolver = Arc::new(self.load_resolver().await?);
        if resolver.is_empty() {
            warn!("Station table is empty, every report row will be skipped");
        }

        let pipeline = self.pipeline_from(&[
            "read-last-known",
            "fetch-reports",
            "decode-reports",
            "normalize-reports",
            "filter-new",
            "write-reports",
            "update-stations",
        ])?;

        // Units run strictly one after another; the per-record upsert key is
        // the only cross-unit safety mechanism needed.
        let mut report = RunReport::default();
        for unit in self.units() {
            let mut context = self.context(kind, unit, resolver.clone());
            pipeline.run(&mut context).await?;
            report.merge(&context.report);
        }
        info!(
            "Ingested {}: {} valid over {} rows, {} new, {} upserted, {} skipped",
            kind,
            report.rows_valid,
            report.rows_total,
            report.new_records,
            report.reports.total(),
            report.rows_skipped
        );

        if self.config.write_footprint {
            self.write_footprint_with(&resolver).await?;
        }
        Ok(report)
    }

    /// The whole job, start to finish: incremental report sync, then the
    /// store handle is released on both the success and the error path.
    pub async fn run(&self) -> Result<RunReport, AwcIngestError> {
        let result = self.sync_reports().call().await;
        let close_result = self.close().await;
        let report = result?;
        close_result?;
        Ok(report)
    }

    /// Writes the grid footprint FeatureCollection to the output directory,
    /// one polygon per ingestion unit tagged with its covered-station count.
    pub async fn write_footprint(&self) -> Result<PathBuf, AwcIngestError> {
        let resolver = self.load_resolver().await?;
        self.write_footprint_with(&resolver).await
    }

    /// Releases the store connection.
    pub async fn close(&self) -> Result<(), AwcIngestError> {
        self.store.close().await?;
        Ok(())
    }

    async fn load_resolver(&self) -> Result<StationResolver, AwcIngestError> {
        let documents = self.store.find_all(STATIONS_COLLECTION).await?;
        let stations = station_features_from_documents(&documents);
        Ok(StationResolver::from_features(stations))
    }

    fn units(&self) -> Vec<IngestionUnit> {
        let boxes = match self.config.grid {
            Some(grid) => self.config.bbox.split(grid),
            None => vec![self.config.bbox],
        };
        boxes
            .into_iter()
            .enumerate()
            .map(|(index, bbox)| IngestionUnit { index, bbox })
            .collect()
    }

    fn whole_extent(&self) -> IngestionUnit {
        IngestionUnit {
            index: 0,
            bbox: self.config.bbox,
        }
    }

    fn context(
        &self,
        kind: DataKind,
        unit: IngestionUnit,
        stations: Arc<StationResolver>,
    ) -> Context {
        Context::new(
            kind,
            unit,
            self.config.clone(),
            self.store.clone(),
            self.feed.clone(),
            stations,
        )
    }

    fn pipeline_from(&self, names: &[&str]) -> Result<Pipeline, AwcIngestError> {
        Ok(Pipeline::new(
            self.registry.sequence(names)?,
            self.registry.sequence(&["clear-data"])?,
            self.registry.sequence(&["clear-data"])?,
        ))
    }

    async fn write_footprint_with(
        &self,
        resolver: &StationResolver,
    ) -> Result<PathBuf, AwcIngestError> {
        let cells: Vec<_> = self
            .units()
            .into_iter()
            .map(|unit| (unit.bbox, resolver.count_within(&unit.bbox)))
            .collect();
        let collection = footprint_collection(&cells);
        let bytes = serde_json::to_vec_pretty(&collection)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e));
        let target = self.config.output_dir.join(FOOTPRINT_FILE);
        let path = target.clone();
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| AwcIngestError::FootprintWrite(self.config.output_dir.clone(), e))?;
        task::spawn_blocking(move || {
            let bytes = bytes.map_err(|e| AwcIngestError::FootprintWrite(path.clone(), e))?;
            let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let mut temp_file = NamedTempFile::new_in(parent)
                .map_err(|e| AwcIngestError::FootprintWrite(path.clone(), e))?;
            temp_file
                .write_all(&bytes)
                .map_err(|e| AwcIngestError::FootprintWrite(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| AwcIngestError::FootprintWrite(path.clone(), e.error))?;
            info!("Wrote footprint to {}", path.display());
            Ok(path)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::decode::ReportRow;
    use crate::store::memory::MemoryStore;
    use crate::types::bounding_box::GridSpec;
    use crate::types::feature::{Feature, FeatureKind, Geometry};
    use serde_json::Value;

    fn kden_station() -> Feature {
        let mut station = Feature::new(FeatureKind::Station);
        station.geometry = Some(Geometry::new(-104.67, 39.86, Some(1650.0)));
        station.set_property("icao", "#KDEN");
        station.set_property("name", "Denver Intl");
        station.set_property("site", "Denver Intl");
        station
    }

    fn kden_row() -> ReportRow {
        ReportRow {
            raw_text: Some("METAR KDEN 010000Z 27010KT ...".to_string()),
            station_id: Some("KDEN".to_string()),
            time: Some("2024-01-01T00:00:00Z".to_string()),
            temperature: Some("5".to_string()),
            dewpoint: Some("-2".to_string()),
            wind_direction: Some("270".to_string()),
            wind_speed: Some("10".to_string()),
            wind_gust: Some("".to_string()),
            visibility: Some("+10000".to_string()),
            cloud_cover: Some("BKN".to_string()),
        }
    }

    async fn seeded_client() -> (AwcIngest, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let client = AwcIngest::new(IngestConfig::default(), store.clone())
            .expect("default config is valid");
        client
            .ensure_collections(DataKind::Metars)
            .await
            .expect("collections created");
        store
            .write_many(STATIONS_COLLECTION, vec![kden_station().to_document()])
            .await
            .expect("station seeded");
        (client, store)
    }

    async fn ingest_rows(client: &AwcIngest, rows: Vec<ReportRow>) -> RunReport {
        let resolver = Arc::new(client.load_resolver().await.expect("resolver loads"));
        let pipeline = client
            .pipeline_from(&[
                "read-last-known",
                "normalize-reports",
                "filter-new",
                "write-reports",
                "update-stations",
            ])
            .expect("stages are registered");
        let mut context = client.context(DataKind::Metars, client.whole_extent(), resolver);
        context.rows = rows;
        pipeline.run(&mut context).await.expect("unit runs");
        context.report
    }

    #[tokio::test]
    async fn end_to_end_kden_observation() {
        let (client, store) = seeded_client().await;
        let report = ingest_rows(&client, vec![kden_row()]).await;
        assert_eq!(report.rows_valid, 1);
        assert_eq!(report.new_records, 1);
        assert_eq!(report.reports.inserted, 1);

        let documents = store
            .find_all(DataKind::Metars.collection())
            .await
            .expect("data readable");
        assert_eq!(documents.len(), 1);
        let document = &documents[0];
        assert_eq!(
            document["properties"]["key"],
            "KDEN-2024-01-01T00:00:00Z"
        );
        assert_eq!(document["properties"]["icao"], "#KDEN");
        assert_eq!(document["properties"]["temperature"], 5.0);
        assert_eq!(document["properties"]["visibility"], 10000);
        assert_eq!(document["time"], "2024-01-01T00:00:00Z");
        assert_eq!(
            document["geometry"]["coordinates"][0].as_f64(),
            Some(-104.67)
        );
        // The empty gust cell never becomes a field.
        assert!(document["properties"].get("windGust").is_none());

        // The station entity was refreshed with the projection, never with
        // measurement values.
        let stations = store
            .find_all(STATIONS_COLLECTION)
            .await
            .expect("stations readable");
        assert_eq!(stations.len(), 1);
        assert!(stations[0]["properties"].get("temperature").is_none());
        assert_eq!(stations[0]["properties"]["icao"], "#KDEN");
    }

    #[tokio::test]
    async fn rerun_with_same_feed_writes_nothing_new() {
        let (client, store) = seeded_client().await;
        let first = ingest_rows(&client, vec![kden_row()]).await;
        assert_eq!(first.new_records, 1);

        let second = ingest_rows(&client, vec![kden_row()]).await;
        assert_eq!(second.new_records, 0);
        assert_eq!(second.reports.total(), 0);

        let documents = store
            .find_all(DataKind::Metars.collection())
            .await
            .expect("data readable");
        assert_eq!(documents.len(), 1);
    }

    #[tokio::test]
    async fn a_newer_observation_is_ingested_alongside_the_old_one() {
        let (client, store) = seeded_client().await;
        ingest_rows(&client, vec![kden_row()]).await;

        let mut newer = kden_row();
        newer.time = Some("2024-01-01T01:00:00Z".to_string());
        let report = ingest_rows(&client, vec![newer]).await;
        assert_eq!(report.new_records, 1);

        // History is kept: both observation times are persisted.
        let documents = store
            .find_all(DataKind::Metars.collection())
            .await
            .expect("data readable");
        assert_eq!(documents.len(), 2);
    }

    #[tokio::test]
    async fn unknown_station_rows_are_skipped_not_fatal() {
        let (client, _store) = seeded_client().await;
        let mut unknown = kden_row();
        unknown.station_id = Some("KXYZ".to_string());
        let report = ingest_rows(&client, vec![kden_row(), unknown]).await;
        assert_eq!(report.rows_total, 2);
        assert_eq!(report.rows_valid, 1);
        assert_eq!(report.rows_skipped, 1);
    }

    #[tokio::test]
    async fn footprint_artifact_lists_grid_cells() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = IngestConfig::default();
        config.output_dir = dir.path().to_path_buf();
        config.grid = Some(GridSpec { cols: 2, rows: 1 });
        let store = Arc::new(MemoryStore::new());
        let client = AwcIngest::new(config, store.clone()).expect("config valid");
        client
            .ensure_collections(DataKind::Metars)
            .await
            .expect("collections created");
        store
            .write_many(STATIONS_COLLECTION, vec![kden_station().to_document()])
            .await
            .expect("station seeded");

        let path = client.write_footprint().await.expect("footprint written");
        let bytes = tokio::fs::read(&path).await.expect("artifact readable");
        let collection: Value = serde_json::from_slice(&bytes).expect("valid geojson");
        let features = collection["features"].as_array().expect("feature array");
        assert_eq!(features.len(), 2);
        // KDEN sits in the western hemisphere cell.
        assert_eq!(features[0]["properties"]["stations"], 1);
        assert_eq!(features[1]["properties"]["stations"], 0);
    }

    #[tokio::test]
    async fn close_releases_the_store() {
        let (client, store) = seeded_client().await;
        client.close().await.expect("close succeeds");
        assert!(store.find_all(STATIONS_COLLECTION).await.is_err());
    }
}
