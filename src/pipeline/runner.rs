//! Runs one ingestion unit: stages strictly in order, an error-stage list on
//! failure, and finalizers on both paths so resources are always released.

use crate::error::AwcIngestError;
use crate::pipeline::context::Context;
use crate::pipeline::stage::Stage;
use log::{debug, warn};
use std::sync::Arc;

pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    error_stages: Vec<Arc<dyn Stage>>,
    finalizers: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(
        stages: Vec<Arc<dyn Stage>>,
        error_stages: Vec<Arc<dyn Stage>>,
        finalizers: Vec<Arc<dyn Stage>>,
    ) -> Self {
        Self {
            stages,
            error_stages,
            finalizers,
        }
    }

    /// Executes the unit. The first stage failure aborts the remaining
    /// stages, runs the error-stage list, and is propagated after the
    /// finalizers ran. Failures inside error stages and finalizers are
    /// logged, never masking the original error.
    pub async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError> {
        let mut failure = None;
        for stage in &self.stages {
            debug!("running stage {}", stage.name());
            if let Err(error) = stage.run(context).await {
                warn!("stage {} failed: {}", stage.name(), error);
                for error_stage in &self.error_stages {
                    if let Err(cleanup_error) = error_stage.run(context).await {
                        warn!(
                            "error stage {} failed: {}",
                            error_stage.name(),
                            cleanup_error
                        );
                    }
                }
                failure = Some(error);
                break;
            }
        }
        for finalizer in &self.finalizers {
            if let Err(error) = finalizer.run(context).await {
                warn!("finalizer {} failed: {}", finalizer.name(), error);
            }
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
