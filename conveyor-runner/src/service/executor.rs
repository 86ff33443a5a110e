//! Build executor service

use conveyor_core::{ImageDescriptor, SharedSink};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::EngineError;
use crate::repository::ContainerEngine;

/// Runs the image build for a checked-out tree
pub struct BuildExecutor {
    engine: Arc<dyn ContainerEngine>,
}

impl BuildExecutor {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Builds `image` from `dir` and resolves the result
    ///
    /// # Returns
    /// The descriptor of the freshly built image. A failing build is returned
    /// unchanged.
    pub async fn build(
        &self,
        dir: &Path,
        image: &str,
        output: &SharedSink,
    ) -> Result<ImageDescriptor, EngineError> {
        self.engine.build_image(dir, image, output).await?;

        let descriptor = self.engine.inspect(image).await?;
        info!("Built image {} ({})", image, descriptor.id);

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, FakeEngine};
    use conveyor_core::MemorySink;

    #[tokio::test]
    async fn test_build_then_inspect() {
        let engine = FakeEngine::new();
        let executor = BuildExecutor::new(Arc::new(engine.clone()));
        let dir = tempfile::tempdir().unwrap();
        let output: SharedSink = Arc::new(MemorySink::new());

        let image = executor
            .build(dir.path(), "acme/widgets", &output)
            .await
            .unwrap();

        assert_eq!(image.name, "acme/widgets");
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Build("acme/widgets".to_string()),
                EngineCall::Inspect("acme/widgets".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_build_failure_is_returned_as_is() {
        let engine = FakeEngine::new().failing_build();
        let executor = BuildExecutor::new(Arc::new(engine.clone()));
        let dir = tempfile::tempdir().unwrap();
        let output: SharedSink = Arc::new(MemorySink::new());

        let err = executor
            .build(dir.path(), "acme/widgets", &output)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Build(_)));
        assert_eq!(engine.calls().len(), 1);
    }
}
