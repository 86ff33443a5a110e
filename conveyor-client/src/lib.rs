//! Conveyor Status Client
//!
//! A small, type-safe HTTP client for the commit status API of the source
//! forge (GitHub-compatible).
//!
//! # Example
//!
//! ```no_run
//! use conveyor_client::StatusClient;
//! use conveyor_core::dto::status::CreateStatus;
//! use conveyor_core::{CommitState, STATUS_CONTEXT};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StatusClient::new("https://api.github.com", "ghp_token");
//!
//!     client
//!         .create_status(
//!             "acme",
//!             "widgets",
//!             "abc123",
//!             &CreateStatus::new(CommitState::Pending, STATUS_CONTEXT),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod statuses;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default base URL of the status API
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Request timeout applied by `StatusClient::new`
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("conveyor/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the commit status API
#[derive(Clone)]
pub struct StatusClient {
    /// Base URL of the API (e.g., "https://api.github.com")
    base_url: String,
    /// Bearer token used for every request
    token: String,
    /// HTTP client instance
    client: Client,
}

impl StatusClient {
    /// Create a new status client whose requests time out after
    /// `DEFAULT_TIMEOUT`
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API
    /// * `token` - Access token with permission to create commit statuses
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, token, client)
    }

    /// Create a new status client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

impl std::fmt::Debug for StatusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StatusClient::new("https://api.github.com", "token");
        assert_eq!(client.base_url(), "https://api.github.com");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = StatusClient::new("https://github.example.com/api/v3/", "token");
        assert_eq!(client.base_url(), "https://github.example.com/api/v3");
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = StatusClient::new(DEFAULT_API_URL, "ghp_secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("<redacted>"));
    }
}
