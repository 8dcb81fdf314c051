//! The named stages the client wires into report and station pipelines.
//! Each is a stateless unit reading and writing the shared context, so every
//! stage stays independently testable.

use crate::config::STATIONS_COLLECTION;
use crate::error::AwcIngestError;
use crate::feeds::decode;
use crate::normalize;
use crate::pipeline::context::Context;
use crate::pipeline::stage::Stage;
use crate::sync::filter::filter_new;
use crate::sync::last_known::LastKnownTimes;
use crate::types::field_path::FieldPath;
use crate::upsert::planner;
use async_trait::async_trait;
use log::info;
use std::mem;

/// Loads the dedup baseline: last persisted time per station key.
pub struct ReadLastKnown;

#[async_trait]
impl Stage for ReadLastKnown {
    fn name(&self) -> &'static str {
        "read-last-known"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let key_path = FieldPath::parse("properties.icao")?;
        let time_path = FieldPath::parse("time")?;
        let entries = context
            .store
            .last_time_per_key(context.kind.collection(), &key_path, &time_path)
            .await?;
        context.most_recent = LastKnownTimes::from_entries(entries);
        Ok(())
    }
}

pub struct FetchReports;

#[async_trait]
impl Stage for FetchReports {
    fn name(&self) -> &'static str {
        "fetch-reports"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let bytes = context
            .feed
            .fetch_reports(context.kind, &context.unit.bbox)
            .await?;
        context.payload = Some(bytes);
        Ok(())
    }
}

pub struct DecodeReports;

#[async_trait]
impl Stage for DecodeReports {
    fn name(&self) -> &'static str {
        "decode-reports"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let payload = context.payload.take().unwrap_or_default();
        context.rows =
            decode::report_rows(payload, context.kind, context.config.skip_lines).await?;
        Ok(())
    }
}

/// Resolves stations and builds canonical features; rows that do not
/// resolve, or fall outside the unit's box, are dropped and counted.
pub struct NormalizeReports;

#[async_trait]
impl Stage for NormalizeReports {
    fn name(&self) -> &'static str {
        "normalize-reports"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let rows = mem::take(&mut context.rows);
        let outcome = normalize::report_features(
            context.kind,
            &rows,
            &context.stations,
            &context.config.station_prefix,
            &context.unit.bbox,
        );
        context.report.rows_total += outcome.total;
        context.report.rows_valid += outcome.features.len();
        context.report.rows_skipped += outcome.skipped;
        context.report.rows_out_of_bounds += outcome.out_of_bounds;
        context.data = outcome.features;
        Ok(())
    }
}

pub struct FilterNew;

#[async_trait]
impl Stage for FilterNew {
    fn name(&self) -> &'static str {
        "filter-new"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let candidates = mem::take(&mut context.data);
        context.data = filter_new(
            candidates,
            context.kind.time_property(),
            &context.most_recent,
        );
        context.report.new_records += context.data.len();
        Ok(())
    }
}

/// Chunked idempotent upsert of the surviving records into the data
/// collection, keyed on `properties.key`.
pub struct WriteReports;

#[async_trait]
impl Stage for WriteReports {
    fn name(&self) -> &'static str {
        "write-reports"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        if context.data.is_empty() {
            info!("No new {} to write, skipping", context.kind);
            return Ok(());
        }
        let rules = planner::report_write_rules(context.kind)?;
        let key_path = FieldPath::parse("properties.key")?;
        let plan = planner::plan_feature_upserts(
            context.kind.collection(),
            &context.data,
            &rules,
            &key_path,
            context.config.chunk_size,
        )?;
        let outcome = planner::execute(plan, context.store.as_ref()).await?;
        context.report.reports.absorb(outcome);
        Ok(())
    }
}

/// The companion entity upsert: project each report down to its stable
/// station attributes and refresh the stations collection.
pub struct UpdateStations;

#[async_trait]
impl Stage for UpdateStations {
    fn name(&self) -> &'static str {
        "update-stations"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        if context.data.is_empty() {
            return Ok(());
        }
        let rules = planner::station_projection_rules(context.kind)?;
        let key_path = FieldPath::parse("properties.icao")?;
        let plan = planner::plan_feature_upserts(
            STATIONS_COLLECTION,
            &context.data,
            &rules,
            &key_path,
            context.config.chunk_size,
        )?;
        let outcome = planner::execute(plan, context.store.as_ref()).await?;
        context.report.stations.absorb(outcome);
        Ok(())
    }
}

pub struct FetchStations;

#[async_trait]
impl Stage for FetchStations {
    fn name(&self) -> &'static str {
        "fetch-stations"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        context.payload = Some(context.feed.fetch_stations().await?);
        Ok(())
    }
}

pub struct DecodeStations;

#[async_trait]
impl Stage for DecodeStations {
    fn name(&self) -> &'static str {
        "decode-stations"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let payload = context.payload.take().unwrap_or_default();
        context.raw_stations = decode::station_records(payload).await?;
        Ok(())
    }
}

pub struct NormalizeStations;

#[async_trait]
impl Stage for NormalizeStations {
    fn name(&self) -> &'static str {
        "normalize-stations"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let records = mem::take(&mut context.raw_stations);
        let total = records.len();
        context.data = normalize::station_features(records, &context.config.station_prefix);
        let valid = context.data.len();
        context.report.rows_total += total;
        context.report.rows_valid += valid;
        context.report.rows_skipped += total - valid;
        Ok(())
    }
}

/// Upserts the full station features, keyed on `properties.icao`.
pub struct WriteStations;

#[async_trait]
impl Stage for WriteStations {
    fn name(&self) -> &'static str {
        "write-stations"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        if context.data.is_empty() {
            info!("No stations to write, skipping");
            return Ok(());
        }
        let rules = crate::transform::rules::TransformRules::new();
        let key_path = FieldPath::parse("properties.icao")?;
        let plan = planner::plan_feature_upserts(
            STATIONS_COLLECTION,
            &context.data,
            &rules,
            &key_path,
            context.config.chunk_size,
        )?;
        let outcome = planner::execute(plan, context.store.as_ref()).await?;
        context.report.stations.absorb(outcome);
        Ok(())
    }
}

/// Drops all transient record state; registered as both an error stage and
/// a finalizer, matching the original job teardown.
pub struct ClearData;

#[async_trait]
impl Stage for ClearData {
    fn name(&self) -> &'static str {
        "clear-data"
    }

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        context.payload = None;
        context.rows.clear();
        context.raw_stations.clear();
        context.data.clear();
        Ok(())
    }
}
