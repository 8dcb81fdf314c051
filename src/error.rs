use crate::config::ConfigError;
use crate::feeds::error::FeedError;
use crate::pipeline::PipelineError;
use crate::store::error::StoreError;
use crate::transform::error::TransformError;
use crate::types::field_path::FieldPathError;
use crate::upsert::planner::UpsertPlanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwcIngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    FieldPath(#[from] FieldPathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    UpsertPlan(#[from] UpsertPlanError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("failed to write footprint artifact '{0}'")]
    FootprintWrite(PathBuf, #[source] std::io::Error),

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
