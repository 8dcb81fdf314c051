//! Plans idempotent writes: transforms each record, derives its per-record
//! filter from its own identity fields, and splits the batch into
//! fixed-size chunks. Chunking is purely a transport concern and never
//! changes what ends up in the store.

use crate::store::error::StoreError;
use crate::store::{DocumentStore, Filter, UpsertOp, UpsertOutcome};
use crate::transform::engine;
use crate::transform::error::TransformError;
use crate::transform::rules::TransformRules;
use crate::types::data_kind::DataKind;
use crate::types::feature::Feature;
use crate::types::field_path::FieldPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpsertPlanError {
    #[error("record {index} has no value at filter key '{path}'")]
    MissingKey { index: usize, path: String },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Splits `items` into contiguous chunks of at most `chunk_size`, preserving
/// order. Concatenating the chunks reproduces the input exactly.
pub fn chunked<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut rest = items;
    while rest.len() > chunk_size {
        let tail = rest.split_off(chunk_size);
        chunks.push(rest);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Transform applied to reports on their way into the data collection:
/// expose the raw per-kind timestamp additionally as top-level `time`, then
/// normalize it to a UTC instant.
pub fn report_write_rules(kind: DataKind) -> Result<TransformRules, TransformError> {
    TransformRules::new()
        .copy(kind.time_path(), "time")?
        .as_date_utc("time")
}

/// Projection for the companion station upsert: strip every time-varying
/// measurement field so the station record only tracks stable identity and
/// location attributes and is never overwritten by transient values.
pub fn station_projection_rules(kind: DataKind) -> Result<TransformRules, TransformError> {
    TransformRules::new().omit_all([
        "time",
        kind.time_path(),
        "properties.key",
        "properties.temperature",
        "properties.dewpoint",
        "properties.windSpeed",
        "properties.windDirection",
        "properties.windGust",
        "properties.cloudCover",
        "properties.visibility",
        "properties.rawOb",
    ])
}

/// An executable write plan for one collection.
#[derive(Debug, Clone)]
pub struct UpsertPlan {
    pub collection: String,
    pub chunks: Vec<Vec<UpsertOp>>,
}

impl UpsertPlan {
    pub fn operation_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

/// Builds the upsert plan for `features`: apply `rules` to each record's
/// document, key its filter on the value at `key_path`, chunk the result.
///
/// The filter is derived from the transformed record itself, so overlapping
/// ingestion units writing the same logical record always race on the same
/// key.
pub fn plan_feature_upserts(
    collection: &str,
    features: &[Feature],
    rules: &TransformRules,
    key_path: &FieldPath,
    chunk_size: usize,
) -> Result<UpsertPlan, UpsertPlanError> {
    let mut operations = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let mut document = feature.to_document();
        engine::apply(rules, &mut document);
        let key = key_path
            .get(&document)
            .cloned()
            .ok_or_else(|| UpsertPlanError::MissingKey {
                index,
                path: key_path.to_string(),
            })?;
        operations.push(UpsertOp {
            filter: Filter::eq(key_path.clone(), key),
            document,
        });
    }
    Ok(UpsertPlan {
        collection: collection.to_string(),
        chunks: chunked(operations, chunk_size),
    })
}

/// Runs the plan chunk by chunk, in order.
pub async fn execute(
    plan: UpsertPlan,
    store: &dyn DocumentStore,
) -> Result<UpsertOutcome, StoreError> {
    let mut outcome = UpsertOutcome::default();
    for chunk in plan.chunks {
        outcome.absorb(store.upsert_many(&plan.collection, chunk).await?);
    }
    Ok(outcome)
}
