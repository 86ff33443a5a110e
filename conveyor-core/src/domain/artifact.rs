//! Artifact and build record domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::build::BuildOutcome;

/// An image that was successfully produced by a build
///
/// Created once by the store after the image has been pushed; never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub build_id: Uuid,
    /// Image reference, e.g. "acme/widgets:abc123"
    pub image: String,
}

/// Persisted record of one build attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: Uuid,
    pub repository: String,
    pub commit_sha: String,
    pub branch: String,
    pub status: BuildStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lifecycle status of a build record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Success,
    Error,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Success => "success",
            BuildStatus::Error => "error",
        }
    }

    /// Parses the stored column value, defaulting unknown values to Error
    pub fn from_db(value: &str) -> Self {
        match value {
            "pending" => BuildStatus::Pending,
            "success" => BuildStatus::Success,
            _ => BuildStatus::Error,
        }
    }
}

impl From<BuildOutcome> for BuildStatus {
    fn from(outcome: BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Success => BuildStatus::Success,
            BuildOutcome::Error => BuildStatus::Error,
        }
    }
}
