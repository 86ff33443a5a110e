//! Build domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::output::SharedSink;
use crate::domain::status::CommitState;

/// A request to build and publish one commit of a repository
///
/// The repository is kept as the raw "owner/name" string; the orchestrator
/// validates it before any collaborator is called.
#[derive(Clone)]
pub struct BuildRequest {
    pub repository: String,
    pub commit: String,
    pub branch: String,
    /// Where streamed subprocess and registry output is written
    pub output: SharedSink,
}

impl BuildRequest {
    pub fn new(
        repository: impl Into<String>,
        commit: impl Into<String>,
        branch: impl Into<String>,
        output: SharedSink,
    ) -> Self {
        Self {
            repository: repository.into(),
            commit: commit.into(),
            branch: branch.into(),
            output,
        }
    }
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("repository", &self.repository)
            .field("commit", &self.commit)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

/// Terminal state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    Success,
    Error,
}

impl BuildOutcome {
    /// Derives the outcome from a pipeline result
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            BuildOutcome::Success
        } else {
            BuildOutcome::Error
        }
    }

    /// The commit status reported for this outcome
    pub fn state(&self) -> CommitState {
        match self {
            BuildOutcome::Success => CommitState::Success,
            BuildOutcome::Error => CommitState::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.state().as_str()
    }
}

/// Pipeline stage, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Workspace,
    Checkout,
    Pull,
    Build,
    Tag,
    Push,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Workspace => "workspace",
            Stage::Checkout => "checkout",
            Stage::Pull => "pull",
            Stage::Build => "build",
            Stage::Tag => "tag",
            Stage::Push => "push",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::output::MemorySink;
    use std::sync::Arc;

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<(), String> = Ok(());
        let err: Result<(), String> = Err("boom".to_string());

        assert_eq!(BuildOutcome::from_result(&ok), BuildOutcome::Success);
        assert_eq!(BuildOutcome::from_result(&err), BuildOutcome::Error);
        assert_eq!(BuildOutcome::Error.state(), CommitState::Error);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Checkout.to_string(), "checkout");
        assert_eq!(Stage::Push.to_string(), "push");
    }

    #[test]
    fn test_request_debug_omits_sink() {
        let request = BuildRequest::new(
            "acme/widgets",
            "abc123",
            "main",
            Arc::new(MemorySink::new()),
        );
        let debug = format!("{:?}", request);
        assert!(debug.contains("acme/widgets"));
        assert!(debug.contains("abc123"));
    }
}
