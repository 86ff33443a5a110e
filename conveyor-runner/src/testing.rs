//! In-memory collaborators for tests
//!
//! Every fake records the calls it receives behind an `Arc<Mutex<..>>`, so a
//! clone handed to the code under test and the one kept by the test observe
//! the same state.

use anyhow::Result;
use async_trait::async_trait;
use conveyor_client::ClientError;
use conveyor_core::{BuildOutcome, BuildRequest, CommitState, ImageDescriptor, SharedSink};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{EngineError, SourceError, StatusError};
use crate::process::ProcessError;
use crate::repository::{ContainerEngine, MetadataRepository, SourceControl};
use crate::service::StatusReporter;

// =============================================================================
// Container engine
// =============================================================================

/// Scripted result of a pull
#[derive(Debug, Clone)]
pub enum PullResult {
    Ok,
    NotFound,
    Fail(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Pull(String, String),
    Build(String),
    Inspect(String),
    Tag(String, String),
    Push(String, String),
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    pulls: HashMap<String, PullResult>,
    fail_build: bool,
    build_delay: Option<Duration>,
    fail_tag: Option<String>,
    push_failures: HashMap<String, u32>,
}

/// Container engine fake
///
/// Pulls of unscripted tags report `TagNotFound`.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pull(self, tag: &str, result: PullResult) -> Self {
        self.state.lock().unwrap().pulls.insert(tag.to_string(), result);
        self
    }

    pub fn failing_build(self) -> Self {
        self.state.lock().unwrap().fail_build = true;
        self
    }

    pub fn slow_build(self, delay: Duration) -> Self {
        self.state.lock().unwrap().build_delay = Some(delay);
        self
    }

    pub fn failing_tag(self, tag: &str) -> Self {
        self.state.lock().unwrap().fail_tag = Some(tag.to_string());
        self
    }

    /// Makes the next `times` pushes of `tag` fail with a registry error
    pub fn failing_push(self, tag: &str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .push_failures
            .insert(tag.to_string(), times);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Tags passed to `tag`, in call order
    pub fn tagged(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Tag(_, tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    /// Tags passed to `push`, one entry per attempt
    pub fn pushed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Push(_, tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull(
        &self,
        repository: &str,
        tag: &str,
        output: &SharedSink,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Pull(repository.to_string(), tag.to_string()));
        let scripted = self.state.lock().unwrap().pulls.get(tag).cloned();

        match scripted.unwrap_or(PullResult::NotFound) {
            PullResult::Ok => {
                output.write_line(&format!("Pulled {}:{}", repository, tag)).unwrap();
                Ok(())
            }
            PullResult::NotFound => Err(EngineError::TagNotFound {
                repository: repository.to_string(),
                tag: tag.to_string(),
            }),
            PullResult::Fail(message) => Err(EngineError::Registry(message.to_string())),
        }
    }

    async fn build_image(
        &self,
        context_dir: &Path,
        image: &str,
        output: &SharedSink,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Build(image.to_string()));
        assert!(context_dir.is_dir(), "build context must exist");

        let (fail, delay) = {
            let state = self.state.lock().unwrap();
            (state.fail_build, state.build_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            output.write_line("Step 2/3 : RUN make").unwrap();
            return Err(EngineError::Build(ProcessError::Exited {
                program: format!("docker build -t {} .", image),
                code: Some(1),
            }));
        }

        output.write_line(&format!("Successfully tagged {}", image)).unwrap();
        Ok(())
    }

    async fn inspect(&self, image: &str) -> Result<ImageDescriptor, EngineError> {
        self.record(EngineCall::Inspect(image.to_string()));
        Ok(ImageDescriptor {
            id: "sha256:0123456789abcdef".to_string(),
            name: image.to_string(),
            repo_tags: vec![format!("{}:latest", image)],
            size: Some(1024),
        })
    }

    async fn tag(&self, image: &str, tag: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Tag(image.to_string(), tag.to_string()));

        let fail = self.state.lock().unwrap().fail_tag.as_deref() == Some(tag);
        if fail {
            return Err(EngineError::Registry(format!("cannot tag {}:{}", image, tag)));
        }
        Ok(())
    }

    async fn push(&self, image: &str, tag: &str, output: &SharedSink) -> Result<(), EngineError> {
        self.record(EngineCall::Push(image.to_string(), tag.to_string()));

        let fail = {
            let mut state = self.state.lock().unwrap();
            match state.push_failures.get_mut(tag) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        if fail {
            return Err(EngineError::Registry(
                "received unexpected HTTP status: 503 Service Unavailable".to_string(),
            ));
        }

        output.write_line(&format!("{}: digest: sha256:feed", tag)).unwrap();
        Ok(())
    }
}

// =============================================================================
// Source control
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Clone {
        url: String,
        branch: String,
        depth: u32,
    },
    Checkout {
        commit: String,
    },
}

#[derive(Default)]
struct SourceState {
    calls: Vec<SourceCall>,
    dirs: Vec<PathBuf>,
    fail_clone: bool,
}

/// Source-control fake
///
/// A successful clone writes a Dockerfile into the destination.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<SourceState>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_clone(self) -> Self {
        self.state.lock().unwrap().fail_clone = true;
        self
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Destination directories passed to `clone_branch`
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().dirs.clone()
    }
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn clone_branch(
        &self,
        remote_url: &str,
        branch: &str,
        depth: u32,
        dest: &Path,
        output: &SharedSink,
    ) -> Result<(), SourceError> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(SourceCall::Clone {
                url: remote_url.to_string(),
                branch: branch.to_string(),
                depth,
            });
            state.dirs.push(dest.to_path_buf());
            state.fail_clone
        };

        if fail {
            output
                .write_line("fatal: Remote branch not found in upstream origin")
                .unwrap();
            return Err(SourceError::Process(ProcessError::Exited {
                program: format!("git clone {}", remote_url),
                code: Some(128),
            }));
        }

        std::fs::write(dest.join("Dockerfile"), "FROM scratch\n").unwrap();
        Ok(())
    }

    async fn checkout(
        &self,
        _dir: &Path,
        commit: &str,
        _output: &SharedSink,
    ) -> Result<(), SourceError> {
        self.state.lock().unwrap().calls.push(SourceCall::Checkout {
            commit: commit.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Status reporter
// =============================================================================

/// Status reporter fake recording every report, including failed ones
#[derive(Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<(String, String, CommitState)>>>,
    failing: bool,
    hanging: Option<CommitState>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reporter whose every report fails with a server error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// A reporter that records `state` and then never answers
    pub fn hanging_on(state: CommitState) -> Self {
        Self {
            hanging: Some(state),
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<(String, String, CommitState)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<CommitState> {
        self.reports().into_iter().map(|(_, _, state)| state).collect()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(
        &self,
        repository: &str,
        commit: &str,
        state: CommitState,
    ) -> Result<(), StatusError> {
        self.reports
            .lock()
            .unwrap()
            .push((repository.to_string(), commit.to_string(), state));

        if self.hanging == Some(state) {
            std::future::pending::<()>().await;
        }
        if self.failing {
            return Err(StatusError::Client(ClientError::api_error(
                502,
                "Bad Gateway",
            )));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "recording"
    }
}

// =============================================================================
// Metadata
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataCall {
    CreateBuild(Uuid, String),
    CompleteBuild(Uuid, BuildOutcome),
    InsertArtifact(Uuid, String),
}

/// Metadata repository fake
#[derive(Clone, Default)]
pub struct FakeMetadata {
    calls: Arc<Mutex<Vec<MetadataCall>>>,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MetadataCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataRepository for FakeMetadata {
    async fn create_build(&self, id: Uuid, request: &BuildRequest) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(MetadataCall::CreateBuild(id, request.repository.clone()));
        Ok(())
    }

    async fn complete_build(&self, id: Uuid, outcome: BuildOutcome) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(MetadataCall::CompleteBuild(id, outcome));
        Ok(())
    }

    async fn insert_artifact(&self, build_id: Uuid, image: &str) -> Result<Uuid> {
        self.calls
            .lock()
            .unwrap()
            .push(MetadataCall::InsertArtifact(build_id, image.to_string()));
        Ok(Uuid::new_v4())
    }
}
