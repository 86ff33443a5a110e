//! Error types for the build pipeline
//!
//! Collaborator errors (`SourceError`, `EngineError`, `StatusError`) are
//! produced by the repository and status layers. The orchestrator wraps stage
//! failures into `PipelineError::Stage`, which renders as "<stage>: <cause>".

use conveyor_client::ClientError;
use conveyor_core::{RepoIdError, Stage};
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::process::ProcessError;

/// Errors from the source-control collaborator
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("refusing to use {0:?} as a git ref")]
    InvalidRef(String),
}

/// Errors from the container engine collaborator
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested tag does not exist in the registry
    #[error("tag {tag} not found in repository {repository}")]
    TagNotFound { repository: String, tag: String },

    /// The daemon rejected a request or could not be reached
    #[error("docker daemon: {0}")]
    Daemon(#[from] bollard::errors::Error),

    /// The registry reported an error inside a progress stream
    #[error("registry: {0}")]
    Registry(String),

    /// The build tool exited unsuccessfully
    #[error(transparent)]
    Build(#[from] ProcessError),
}

impl EngineError {
    pub fn is_tag_not_found(&self) -> bool {
        matches!(self, EngineError::TagNotFound { .. })
    }

    /// Whether a push that failed this way is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::TagNotFound { .. } | EngineError::Build(_) => false,
            EngineError::Daemon(bollard::errors::Error::DockerResponseServerError {
                status_code,
                ..
            }) => *status_code >= 500,
            EngineError::Daemon(_) | EngineError::Registry(_) => true,
        }
    }
}

/// Errors from the status reporter
#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    InvalidRepository(#[from] RepoIdError),

    #[error("status API: {0}")]
    Client(#[from] ClientError),

    #[error("status API did not answer within {0:?}")]
    TimedOut(Duration),
}

impl StatusError {
    pub fn is_transient(&self) -> bool {
        match self {
            StatusError::Client(e) => e.is_transient(),
            StatusError::TimedOut(_) => true,
            StatusError::InvalidRepository(_) => false,
        }
    }
}

/// Cause of a failed pipeline stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Error returned by `Orchestrator::execute`
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidRepository(#[from] RepoIdError),

    #[error("tempdir: {0}")]
    Workspace(#[source] io::Error),

    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    /// The stage that failed, if the failure happened inside a stage
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            PipelineError::Workspace(_) => Some(Stage::Workspace),
            PipelineError::InvalidRepository(_) => None,
        }
    }
}
