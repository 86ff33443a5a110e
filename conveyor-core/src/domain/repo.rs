//! Repository identifier types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a repository identifier is not of the form "owner/name"
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoIdError {
    #[error("invalid repository identifier: {0:?} (expected \"owner/name\")")]
    Invalid(String),
}

/// A validated "owner/name" repository identifier
///
/// Both halves are non-empty and neither contains a `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    /// Parses an "owner/name" identifier
    ///
    /// # Arguments
    /// * `input` - Raw identifier, e.g. "acme/widgets"
    ///
    /// # Returns
    /// The parsed identifier, or `RepoIdError::Invalid` when the input has
    /// zero or several separators or an empty half
    pub fn parse(input: &str) -> Result<Self, RepoIdError> {
        let invalid = || RepoIdError::Invalid(input.to_string());

        let (owner, name) = input.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        if input.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = RepoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = RepoIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.to_string()
    }
}
