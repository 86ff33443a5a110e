//! Build service
//!
//! Wraps the orchestrator with the side effects that sit outside the
//! pipeline itself: the build log upload and the metadata rows. Failures of
//! either are logged and never change the build result.

use conveyor_core::{BuildOutcome, BuildRequest, ImageDescriptor, SharedSink, TeeSink};
use conveyor_store::logs::{LogStore, LogWriter};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::repository::MetadataRepository;
use crate::service::orchestrator::Orchestrator;

/// Result of one build and the records written for it
#[derive(Debug)]
pub struct BuildSummary {
    pub build_id: Uuid,
    pub result: Result<ImageDescriptor, PipelineError>,
    /// Artifact row id, when the build succeeded and metadata is stored
    pub artifact_id: Option<Uuid>,
    /// Object key of the uploaded log, when logs are stored
    pub log_key: Option<String>,
}

impl BuildSummary {
    pub fn outcome(&self) -> BuildOutcome {
        BuildOutcome::from_result(&self.result)
    }
}

pub struct BuildService {
    orchestrator: Orchestrator,
    console: SharedSink,
    logs: Option<LogStore>,
    metadata: Option<Arc<dyn MetadataRepository>>,
}

impl BuildService {
    /// Creates a build service that streams output to `console` only
    pub fn new(orchestrator: Orchestrator, console: SharedSink) -> Self {
        Self {
            orchestrator,
            console,
            logs: None,
            metadata: None,
        }
    }

    /// Also keeps a copy of the output in the log store
    pub fn with_logs(mut self, logs: LogStore) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Records builds and artifacts in a metadata repository
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataRepository>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Runs one build
    ///
    /// # Arguments
    /// * `build_id` - Identifier used for the build row and the log name
    /// * `repository` - "owner/name" identifier
    /// * `commit` - Commit to build
    /// * `branch` - Branch containing the commit
    pub async fn run(
        &self,
        build_id: Uuid,
        repository: &str,
        commit: &str,
        branch: &str,
    ) -> BuildSummary {
        let writer = self.open_log(build_id);
        let output: SharedSink = match &writer {
            Some(writer) => Arc::new(TeeSink::new(self.console.clone(), writer.clone())),
            None => self.console.clone(),
        };

        let request = BuildRequest::new(repository, commit, branch, output);

        if let Some(metadata) = &self.metadata {
            if let Err(e) = metadata.create_build(build_id, &request).await {
                warn!("Build {}: {:#}", build_id, e);
            }
        }

        let result = self.orchestrator.execute(&request).await;
        let outcome = BuildOutcome::from_result(&result);

        let log_key = match writer {
            Some(writer) => close_log(&writer).await,
            None => None,
        };

        let mut artifact_id = None;
        if let Some(metadata) = &self.metadata {
            if let Ok(image) = &result {
                match metadata.insert_artifact(build_id, &image.name).await {
                    Ok(id) => artifact_id = Some(id),
                    Err(e) => warn!("Build {}: {:#}", build_id, e),
                }
            }

            if let Err(e) = metadata.complete_build(build_id, outcome).await {
                warn!("Build {}: {:#}", build_id, e);
            }
        }

        info!("Build {} finished with {}", build_id, outcome.as_str());

        BuildSummary {
            build_id,
            result,
            artifact_id,
            log_key,
        }
    }

    fn open_log(&self, build_id: Uuid) -> Option<Arc<LogWriter>> {
        let logs = self.logs.as_ref()?;
        match logs.create(&build_id.to_string()) {
            Ok(writer) => Some(writer),
            Err(e) => {
                warn!("Build {}: cannot create log: {}", build_id, e);
                None
            }
        }
    }
}

/// Uploads the log, returning its key on success
async fn close_log(writer: &LogWriter) -> Option<String> {
    match writer.close().await {
        Ok(()) => Some(writer.key().to_string()),
        Err(e) => {
            warn!("Failed to store build log {}: {}", writer.key(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::service::orchestrator::PipelineSettings;
    use crate::testing::{FakeEngine, FakeMetadata, FakeSource, MetadataCall, RecordingReporter};
    use conveyor_core::MemorySink;
    use conveyor_store::logs::MemoryBlobStore;
    use std::time::Duration;

    fn orchestrator(root: &std::path::Path, engine: FakeEngine) -> Orchestrator {
        let settings = PipelineSettings {
            build_root: root.to_path_buf(),
            remote_template: "https://github.com/{repository}.git".to_string(),
            clone_depth: 50,
            stage_timeout: Duration::from_secs(30),
            push_retry: RetryPolicy::immediate(3),
            status_retry: RetryPolicy::immediate(3),
            status_timeout: Duration::from_secs(30),
        };

        Orchestrator::new(
            settings,
            Arc::new(RecordingReporter::new()),
            Arc::new(FakeSource::new()),
            Arc::new(engine),
        )
    }

    #[tokio::test]
    async fn test_successful_build_records_everything() {
        let root = tempfile::tempdir().unwrap();
        let console = MemorySink::new();
        let blobs = MemoryBlobStore::new();
        let metadata = FakeMetadata::new();
        let service = BuildService::new(
            orchestrator(root.path(), FakeEngine::new()),
            Arc::new(console.clone()),
        )
        .with_logs(LogStore::new(Arc::new(blobs.clone())))
        .with_metadata(Arc::new(metadata.clone()));

        let build_id = Uuid::new_v4();
        let summary = service
            .run(build_id, "acme/widgets", "abc123", "main")
            .await;

        assert_eq!(summary.outcome(), BuildOutcome::Success);
        assert!(summary.artifact_id.is_some());

        let key = format!("logs/{}.txt", build_id);
        assert_eq!(summary.log_key.as_deref(), Some(key.as_str()));

        let puts = blobs.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].key, key);
        assert_eq!(puts[0].body, console.contents());
        assert!(console.contents_lossy().contains("==> push"));

        assert_eq!(
            metadata.calls(),
            vec![
                MetadataCall::CreateBuild(build_id, "acme/widgets".to_string()),
                MetadataCall::InsertArtifact(build_id, "acme/widgets".to_string()),
                MetadataCall::CompleteBuild(build_id, BuildOutcome::Success),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_build_has_no_artifact() {
        let root = tempfile::tempdir().unwrap();
        let blobs = MemoryBlobStore::new();
        let metadata = FakeMetadata::new();
        let service = BuildService::new(
            orchestrator(root.path(), FakeEngine::new().failing_build()),
            Arc::new(MemorySink::new()),
        )
        .with_logs(LogStore::new(Arc::new(blobs.clone())))
        .with_metadata(Arc::new(metadata.clone()));

        let build_id = Uuid::new_v4();
        let summary = service
            .run(build_id, "acme/widgets", "abc123", "main")
            .await;

        assert_eq!(summary.outcome(), BuildOutcome::Error);
        assert!(summary.artifact_id.is_none());
        assert_eq!(blobs.puts().len(), 1);
        assert_eq!(
            metadata.calls(),
            vec![
                MetadataCall::CreateBuild(build_id, "acme/widgets".to_string()),
                MetadataCall::CompleteBuild(build_id, BuildOutcome::Error),
            ]
        );
    }

    #[tokio::test]
    async fn test_runs_without_optional_stores() {
        let root = tempfile::tempdir().unwrap();
        let console = MemorySink::new();
        let service = BuildService::new(
            orchestrator(root.path(), FakeEngine::new()),
            Arc::new(console.clone()),
        );

        let summary = service
            .run(Uuid::new_v4(), "acme/widgets", "abc123", "main")
            .await;

        assert!(summary.result.is_ok());
        assert!(summary.log_key.is_none());
        assert!(summary.artifact_id.is_none());
        assert!(console.contents_lossy().contains("==> checkout"));
    }
}
