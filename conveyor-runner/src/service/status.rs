//! Status reporting service
//!
//! Publishes build state transitions for a commit under the
//! `container/docker` context. Without an API token the reporter only prints
//! what it would have sent.

use async_trait::async_trait;
use conveyor_client::StatusClient;
use conveyor_core::dto::status::CreateStatus;
use conveyor_core::{CommitState, RepoId, STATUS_CONTEXT, SharedSink};
use std::sync::Arc;
use tracing::debug;

use crate::error::StatusError;

/// Service for reporting commit statuses
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Reports `state` for `commit` of `repository`
    ///
    /// # Arguments
    /// * `repository` - "owner/name" identifier
    /// * `commit` - Commit the status applies to
    /// * `state` - State to record
    async fn report(
        &self,
        repository: &str,
        commit: &str,
        state: CommitState,
    ) -> Result<(), StatusError>;

    /// Short name of the variant, for logs
    fn kind(&self) -> &'static str;
}

/// Picks the reporter variant based on whether a token is configured
///
/// # Arguments
/// * `token` - Status API token, if any
/// * `api_url` - Status API base URL
/// * `fallback` - Where the no-op variant writes its lines
pub fn from_token(
    token: Option<&str>,
    api_url: &str,
    fallback: SharedSink,
) -> Arc<dyn StatusReporter> {
    match token {
        Some(token) if !token.is_empty() => {
            Arc::new(GitHubStatusReporter::new(StatusClient::new(api_url, token)))
        }
        _ => Arc::new(NullStatusReporter::new(fallback)),
    }
}

fn description(state: CommitState) -> &'static str {
    match state {
        CommitState::Pending => "Building container image",
        CommitState::Success => "Container image pushed",
        CommitState::Error => "Container image build failed",
    }
}

/// Reporter that calls the commit status API
pub struct GitHubStatusReporter {
    client: StatusClient,
}

impl GitHubStatusReporter {
    pub fn new(client: StatusClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusReporter for GitHubStatusReporter {
    async fn report(
        &self,
        repository: &str,
        commit: &str,
        state: CommitState,
    ) -> Result<(), StatusError> {
        let repo = RepoId::parse(repository)?;
        let status = CreateStatus::new(state, STATUS_CONTEXT).with_description(description(state));

        let created = self
            .client
            .create_status(repo.owner(), repo.name(), commit, &status)
            .await?;

        debug!(
            "Status {} recorded for {}@{} (id {:?})",
            created.state, repo, commit, created.id
        );
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "github"
    }
}

/// Reporter used when no token is configured
///
/// Writes a human-readable line per transition and always succeeds.
pub struct NullStatusReporter {
    output: SharedSink,
}

impl NullStatusReporter {
    pub fn new(output: SharedSink) -> Self {
        Self { output }
    }
}

#[async_trait]
impl StatusReporter for NullStatusReporter {
    async fn report(
        &self,
        repository: &str,
        commit: &str,
        state: CommitState,
    ) -> Result<(), StatusError> {
        let (owner, name) = repository.split_once('/').unwrap_or((repository, ""));
        let line = format!(
            "Updating status of {} on {}/{} to {}",
            commit, owner, name, state
        );

        if let Err(e) = self.output.write_line(&line) {
            debug!("Dropped status line: {}", e);
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "null"
    }
}
