//! Commit status domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Context label attached to every commit status this pipeline reports
pub const STATUS_CONTEXT: &str = "container/docker";

/// State of a commit status as understood by the source forge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Error => "error",
        }
    }

    /// Whether this state ends a build
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommitState::Pending)
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
