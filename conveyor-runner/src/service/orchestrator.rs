//! Build orchestrator
//!
//! Runs one build request through the pipeline:
//!
//! 1. Allocate a working directory
//! 2. Report "pending"
//! 3. Checkout (clone branch, check out commit)
//! 4. Warm the image cache from the branch tag, then "latest"
//! 5. Build the image
//! 6. Tag it with the branch and commit
//! 7. Push "latest", the branch, and the commit
//! 8. Report "success" or "error"
//!
//! Each step aborts the remaining ones on failure. Step 8 runs on every exit
//! path through `StatusGuard`, including cancellation of the build future.

use conveyor_core::{
    BuildOutcome, BuildRequest, CommitState, ImageDescriptor, RepoId, SharedSink, Stage,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::Config;
use crate::error::{PipelineError, StageError, StatusError};
use crate::repository::{ContainerEngine, SourceControl};
use crate::retry::{RetryPolicy, retry};
use crate::service::cache::CacheResolver;
use crate::service::checkout::Checkout;
use crate::service::executor::BuildExecutor;
use crate::service::publisher::Publisher;
use crate::service::StatusReporter;
use crate::workspace::Workspace;

/// Tag every pushed image also receives
const LATEST_TAG: &str = "latest";

/// Tunables of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub build_root: PathBuf,
    pub remote_template: String,
    pub clone_depth: u32,
    pub stage_timeout: Duration,
    pub push_retry: RetryPolicy,
    pub status_retry: RetryPolicy,
    pub status_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let backoff = RetryPolicy::default();

        Self {
            build_root: config.build_dir.clone(),
            remote_template: config.git_remote_template.clone(),
            clone_depth: config.clone_depth,
            stage_timeout: config.stage_timeout,
            push_retry: backoff.with_attempts(config.push_retries),
            status_retry: backoff.with_attempts(config.status_retries),
            status_timeout: config.status_timeout,
        }
    }
}

/// Composes the pipeline services for one build at a time
///
/// An orchestrator holds no per-build state; concurrent `execute` calls are
/// independent.
pub struct Orchestrator {
    settings: PipelineSettings,
    reporter: Arc<dyn StatusReporter>,
    checkout: Checkout,
    cache: CacheResolver,
    executor: BuildExecutor,
    publisher: Publisher,
}

impl Orchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    /// * `settings` - Pipeline tunables
    /// * `reporter` - Commit status reporter
    /// * `source` - Source-control repository
    /// * `engine` - Container engine repository
    pub fn new(
        settings: PipelineSettings,
        reporter: Arc<dyn StatusReporter>,
        source: Arc<dyn SourceControl>,
        engine: Arc<dyn ContainerEngine>,
    ) -> Self {
        let checkout = Checkout::new(
            source,
            settings.remote_template.clone(),
            settings.clone_depth,
        );
        let cache = CacheResolver::new(Arc::clone(&engine));
        let executor = BuildExecutor::new(Arc::clone(&engine));
        let publisher = Publisher::new(engine, settings.push_retry);

        Self {
            settings,
            reporter,
            checkout,
            cache,
            executor,
            publisher,
        }
    }

    /// Runs the full pipeline for `request`
    ///
    /// Exactly one "pending" and then exactly one terminal status are
    /// reported, whatever the result.
    ///
    /// # Returns
    /// The built image on success, or the first failure wrapped with the
    /// stage it happened in
    pub async fn execute(&self, request: &BuildRequest) -> Result<ImageDescriptor, PipelineError> {
        let span = info_span!(
            "build",
            repository = %request.repository,
            commit = %request.commit,
            branch = %request.branch,
        );

        async {
            let mut guard = StatusGuard::new(
                Arc::clone(&self.reporter),
                &request.repository,
                &request.commit,
                StatusDelivery {
                    policy: self.settings.status_retry,
                    deadline: self.settings.status_timeout,
                },
            );

            let result = self.run(request, &mut guard).await;
            let outcome = BuildOutcome::from_result(&result);

            match &result {
                Ok(image) => info!("Build succeeded: {} ({})", image.name, image.id),
                Err(e) => error!("Build failed: {}", e),
            }

            guard.finish(outcome).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &BuildRequest,
        guard: &mut StatusGuard,
    ) -> Result<ImageDescriptor, PipelineError> {
        let repo = RepoId::parse(&request.repository)?;
        let output = &request.output;

        let workspace = Workspace::allocate(&self.settings.build_root, &request.commit)
            .map_err(PipelineError::Workspace)?;

        guard.arm().await;

        self.stage(
            Stage::Checkout,
            output,
            self.checkout.checkout(
                &repo,
                &request.branch,
                &request.commit,
                workspace.path(),
                output,
            ),
        )
        .await?;

        let image_name = repo.to_string();
        let candidates = [request.branch.as_str(), LATEST_TAG];
        self.stage(
            Stage::Pull,
            output,
            self.cache.warm(&image_name, &candidates, output),
        )
        .await?;

        let image = self
            .stage(
                Stage::Build,
                output,
                self.executor.build(workspace.path(), &image_name, output),
            )
            .await?;

        let tags = vec![request.branch.clone(), request.commit.clone()];
        self.stage(Stage::Tag, output, self.publisher.tag(&image_name, &tags))
            .await?;

        let push_tags = vec![
            LATEST_TAG.to_string(),
            request.branch.clone(),
            request.commit.clone(),
        ];
        self.stage(
            Stage::Push,
            output,
            self.publisher.push(&image_name, output, &push_tags),
        )
        .await?;

        workspace.release();
        Ok(image)
    }

    /// Runs one stage under the stage deadline and labels its failure
    async fn stage<T, E, F>(
        &self,
        stage: Stage,
        output: &SharedSink,
        work: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StageError>,
    {
        info!(%stage, "Stage started");
        if let Err(e) = output.write_line(&format!("==> {}", stage)) {
            warn!("Failed to write stage marker: {}", e);
        }

        let deadline = self.settings.stage_timeout;
        let result = match tokio::time::timeout(deadline, work).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(StageError::TimedOut(deadline)),
        };

        match result {
            Ok(value) => {
                info!(%stage, "Stage finished");
                Ok(value)
            }
            Err(source) => {
                error!(%stage, "Stage failed: {}", source);
                Err(PipelineError::Stage { stage, source })
            }
        }
    }
}

// =============================================================================
// Status Guard
// =============================================================================

/// Retry budget and per-attempt deadline of a status report
#[derive(Debug, Clone, Copy)]
struct StatusDelivery {
    policy: RetryPolicy,
    deadline: Duration,
}

/// Guarantees the pending/terminal status pair for one build
///
/// `arm` reports "pending". `finish` hands the terminal state to a detached
/// task, sending "pending" first if it never went out, and waits for it. A
/// guard dropped before `finish` reports "error" the same way. Once the
/// terminal task is spawned the guard is spent, so cancelling the caller
/// cannot produce a second terminal state.
struct StatusGuard {
    reporter: Arc<dyn StatusReporter>,
    repository: String,
    commit: String,
    delivery: StatusDelivery,
    pending_sent: bool,
    terminal_sent: bool,
}

impl StatusGuard {
    fn new(
        reporter: Arc<dyn StatusReporter>,
        repository: &str,
        commit: &str,
        delivery: StatusDelivery,
    ) -> Self {
        Self {
            reporter,
            repository: repository.to_string(),
            commit: commit.to_string(),
            delivery,
            pending_sent: false,
            terminal_sent: false,
        }
    }

    async fn arm(&mut self) {
        if self.pending_sent {
            return;
        }
        self.pending_sent = true;
        send_status(
            self.reporter.as_ref(),
            &self.repository,
            &self.commit,
            CommitState::Pending,
            self.delivery,
        )
        .await;
    }

    async fn finish(mut self, outcome: BuildOutcome) {
        let handle = tokio::runtime::Handle::current();
        let task = self.spawn_terminal(&handle, outcome.state());

        if let Err(e) = task.await {
            error!("Terminal status task failed: {}", e);
        }
    }

    /// Marks the guard spent and reports `state` from a detached task
    fn spawn_terminal(
        &mut self,
        handle: &tokio::runtime::Handle,
        state: CommitState,
    ) -> tokio::task::JoinHandle<()> {
        let send_pending = !self.pending_sent;
        self.pending_sent = true;
        self.terminal_sent = true;

        let reporter = Arc::clone(&self.reporter);
        let repository = self.repository.clone();
        let commit = self.commit.clone();
        let delivery = self.delivery;

        handle.spawn(async move {
            if send_pending {
                send_status(
                    reporter.as_ref(),
                    &repository,
                    &commit,
                    CommitState::Pending,
                    delivery,
                )
                .await;
            }
            send_status(reporter.as_ref(), &repository, &commit, state, delivery).await;
        })
    }
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        if self.terminal_sent {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    "Build of {}@{} ended without a terminal status, reporting error",
                    self.repository, self.commit
                );
                let _ = self.spawn_terminal(&handle, CommitState::Error);
            }
            Err(_) => {
                error!(
                    "Build of {}@{} ended outside a runtime, no terminal status sent",
                    self.repository, self.commit
                );
            }
        }
    }
}

/// Reports a status with retries and a deadline per attempt; a final failure
/// is only logged
async fn send_status(
    reporter: &dyn StatusReporter,
    repository: &str,
    commit: &str,
    state: CommitState,
    delivery: StatusDelivery,
) {
    let what = format!("{} status for {}@{}", state, repository, commit);
    let deadline = delivery.deadline;

    let result = retry(delivery.policy, &what, StatusError::is_transient, move || async move {
        match tokio::time::timeout(deadline, reporter.report(repository, commit, state)).await {
            Ok(result) => result,
            Err(_) => Err(StatusError::TimedOut(deadline)),
        }
    })
    .await;

    if let Err(e) = result {
        warn!("Giving up on {} via {} reporter: {}", what, reporter.kind(), e);
    }
}
