mod config;
mod error;
mod feeds;
mod ingest;
mod normalize;
mod pipeline;
mod stations;
mod store;
mod sync;
mod transform;
mod types;
mod upsert;

pub use error::AwcIngestError;
pub use ingest::*;

pub use config::{
    ConfigError, IngestConfig, DEFAULT_CHUNK_SIZE, DEFAULT_DB_URL, DEFAULT_FEED_BASE_URL,
    DEFAULT_SKIP_LINES, DEFAULT_TTL, STATIONS_COLLECTION,
};

pub use types::bounding_box::{
    footprint_collection, BoundingBox, BoundingBoxError, GridSpec, GridSpecError, WORLD,
};
pub use types::data_kind::{DataKind, DataKindError};
pub use types::feature::{
    parse_utc_instant, Document, Feature, FeatureKind, Geometry, INVALID_ELEVATION,
};
pub use types::field_path::{FieldPath, FieldPathError};

pub use feeds::decode::{report_rows, station_records, RawStation, ReportRow};
pub use feeds::error::FeedError;
pub use feeds::fetch::FeedClient;

pub use normalize::{
    coerce_number, discretize_visibility, report_features, station_features,
    station_features_from_documents, NormalizeOutcome,
};

pub use stations::resolver::StationResolver;

pub use transform::engine;
pub use transform::error::TransformError;
pub use transform::rules::{MappingRule, TransformRules, UnitConversion};

pub use sync::filter::filter_new;
pub use sync::last_known::{LastKnownEntry, LastKnownTimes};

pub use store::error::StoreError;
pub use store::memory::MemoryStore;
pub use store::{DocumentStore, Filter, IndexSpec, SortOrder, UpsertOp, UpsertOutcome};

pub use upsert::planner;
pub use upsert::planner::{UpsertPlan, UpsertPlanError};

pub use pipeline::stages;
pub use pipeline::{
    Context, IngestionUnit, Pipeline, PipelineError, RunReport, Stage, StageRegistry,
};
