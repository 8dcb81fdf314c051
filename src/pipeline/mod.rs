//! The orchestration contract: named stages over a shared mutable context,
//! run strictly in sequence within one ingestion unit. Deliberately minimal;
//! this is a calling convention, not a workflow engine.

pub mod context;
pub mod runner;
pub mod stage;
pub mod stages;

pub use context::{Context, IngestionUnit, RunReport};
pub use runner::Pipeline;
pub use stage::{Stage, StageRegistry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown pipeline stage '{0}'")]
    UnknownStage(String),
}
