//! Commit status DTOs

use serde::{Deserialize, Serialize};

use crate::domain::status::CommitState;

/// Body of a create-status request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStatus {
    pub state: CommitState,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

impl CreateStatus {
    pub fn new(state: CommitState, context: impl Into<String>) -> Self {
        Self {
            state,
            context: context.into(),
            description: None,
            target_url: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Status as returned by the API after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStatus {
    pub id: Option<u64>,
    pub state: CommitState,
    pub context: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
