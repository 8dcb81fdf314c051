//! The stage seam: a named unit of pipeline work, registered by name and
//! invoked polymorphically, so orchestration order is data rather than
//! logic embedded in configuration.

use crate::error::AwcIngestError;
use crate::pipeline::context::Context;
use crate::pipeline::PipelineError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, context: &mut Context) -> Result<(), AwcIngestError>;
}

/// Stages keyed by name. Pipelines are assembled from name sequences, so a
/// typo fails fast with [`PipelineError::UnknownStage`] instead of silently
/// skipping work.
#[derive(Default)]
pub struct StageRegistry {
    stages: HashMap<&'static str, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.name(), stage);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    pub fn sequence(&self, names: &[&str]) -> Result<Vec<Arc<dyn Stage>>, PipelineError> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Stage for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn run(&self, _context: &mut Context) -> Result<(), AwcIngestError> {
            Ok(())
        }
    }

    #[test]
    fn unknown_stage_names_fail_fast() {
        let mut registry = StageRegistry::new();
        registry.register(Arc::new(Noop));
        assert!(registry.sequence(&["noop"]).is_ok());
        assert!(matches!(
            registry.sequence(&["noop", "typo"]),
            Err(PipelineError::UnknownStage(name)) if name == "typo"
        ));
    }
}
