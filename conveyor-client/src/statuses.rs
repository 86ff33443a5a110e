//! Commit status API endpoints

use conveyor_core::dto::status::{CreateStatus, RepoStatus};
use reqwest::header::{ACCEPT, USER_AGENT as USER_AGENT_HEADER};

use crate::StatusClient;
use crate::error::{ClientError, Result};

impl StatusClient {
    // =============================================================================
    // Commit Statuses
    // =============================================================================

    /// Create a status for a commit
    ///
    /// # Arguments
    /// * `owner` - Repository owner
    /// * `repo` - Repository name
    /// * `reference` - Commit SHA (or ref) the status applies to
    /// * `status` - State and context to record
    ///
    /// # Returns
    /// The status as stored by the API
    pub async fn create_status(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        status: &CreateStatus,
    ) -> Result<RepoStatus> {
        if owner.is_empty() || repo.is_empty() || reference.is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "owner, repo and ref are required (got {:?}/{:?}@{:?})",
                owner, repo, reference
            )));
        }

        let url = format!(
            "{}/repos/{}/{}/statuses/{}",
            self.base_url, owner, repo, reference
        );

        tracing::debug!(
            "Creating status {} for {}/{}@{}",
            status.state,
            owner,
            repo,
            reference
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT_HEADER, crate::USER_AGENT)
            .json(status)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
