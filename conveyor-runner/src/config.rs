//! Runner configuration
//!
//! Defines all configurable parameters for a build including registry
//! credentials, status API settings, stage deadlines, and retry budgets.

use std::path::PathBuf;
use std::time::Duration;

use conveyor_client::DEFAULT_API_URL;

/// Placeholder substituted with "owner/name" in the remote template
pub const REPOSITORY_PLACEHOLDER: &str = "{repository}";

/// Runner configuration
#[derive(Clone)]
pub struct Config {
    /// Directory under which per-build working directories are created
    pub build_dir: PathBuf,

    /// Registry credentials used for pull and push
    pub docker_username: Option<String>,
    pub docker_password: Option<String>,

    /// Status API token; without one, statuses are only printed
    pub github_token: Option<String>,

    /// Status API base URL (e.g., "https://api.github.com")
    pub github_api_url: String,

    /// Remote URL template, e.g. "https://github.com/{repository}.git"
    pub git_remote_template: String,

    /// History depth for the shallow clone
    pub clone_depth: u32,

    /// Deadline applied to each pipeline stage
    pub stage_timeout: Duration,

    /// Attempts per pushed tag
    pub push_retries: u32,

    /// Attempts per status report
    pub status_retries: u32,

    /// Deadline applied to each status report attempt
    pub status_timeout: Duration,

    /// Postgres connection string for build metadata
    pub database_url: Option<String>,

    /// S3 bucket receiving build logs
    pub logs_bucket: Option<String>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - BUILD_DIR (default: <tmp>/conveyor)
    /// - DOCKER_USERNAME, DOCKER_PASSWORD
    /// - GITHUB_TOKEN
    /// - GITHUB_API_URL (default: https://api.github.com)
    /// - GIT_REMOTE_TEMPLATE (default: https://github.com/{repository}.git)
    /// - CLONE_DEPTH (default: 50)
    /// - STAGE_TIMEOUT (seconds, default: 1800)
    /// - PUSH_RETRIES (default: 3)
    /// - STATUS_RETRIES (default: 3)
    /// - STATUS_TIMEOUT (seconds, default: 30)
    /// - DATABASE_URL
    /// - LOGS_BUCKET
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let clone_depth = parse_var(&var, "CLONE_DEPTH")?.unwrap_or(defaults.clone_depth);

        let stage_timeout = parse_var::<u64>(&var, "STAGE_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.stage_timeout);

        let push_retries = parse_var(&var, "PUSH_RETRIES")?.unwrap_or(defaults.push_retries);
        let status_retries =
            parse_var(&var, "STATUS_RETRIES")?.unwrap_or(defaults.status_retries);
        let status_timeout = parse_var::<u64>(&var, "STATUS_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.status_timeout);

        Ok(Self {
            build_dir: var("BUILD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.build_dir),
            docker_username: var("DOCKER_USERNAME"),
            docker_password: var("DOCKER_PASSWORD"),
            github_token: var("GITHUB_TOKEN"),
            github_api_url: var("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            git_remote_template: var("GIT_REMOTE_TEMPLATE")
                .unwrap_or(defaults.git_remote_template),
            clone_depth,
            stage_timeout,
            push_retries,
            status_retries,
            status_timeout,
            database_url: var("DATABASE_URL"),
            logs_bucket: var("LOGS_BUCKET"),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.build_dir.as_os_str().is_empty() {
            anyhow::bail!("build_dir cannot be empty");
        }

        if !self.github_api_url.starts_with("http://")
            && !self.github_api_url.starts_with("https://")
        {
            anyhow::bail!("github_api_url must start with http:// or https://");
        }

        if !self.git_remote_template.contains(REPOSITORY_PLACEHOLDER) {
            anyhow::bail!(
                "git_remote_template must contain the {} placeholder",
                REPOSITORY_PLACEHOLDER
            );
        }

        if self.clone_depth == 0 {
            anyhow::bail!("clone_depth must be greater than 0");
        }

        if self.stage_timeout.as_secs() == 0 {
            anyhow::bail!("stage_timeout must be greater than 0");
        }

        if self.push_retries == 0 {
            anyhow::bail!("push_retries must be greater than 0");
        }

        if self.status_retries == 0 {
            anyhow::bail!("status_retries must be greater than 0");
        }

        if self.status_timeout.as_secs() == 0 {
            anyhow::bail!("status_timeout must be greater than 0");
        }

        if self.docker_username.is_some() != self.docker_password.is_some() {
            anyhow::bail!("DOCKER_USERNAME and DOCKER_PASSWORD must be set together");
        }

        Ok(())
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build_dir: std::env::temp_dir().join("conveyor"),
            docker_username: None,
            docker_password: None,
            github_token: None,
            github_api_url: DEFAULT_API_URL.to_string(),
            git_remote_template: format!("https://github.com/{}.git", REPOSITORY_PLACEHOLDER),
            clone_depth: 50,
            stage_timeout: Duration::from_secs(1800), // 30 minutes
            push_retries: 3,
            status_retries: 3,
            status_timeout: Duration::from_secs(30),
            database_url: None,
            logs_bucket: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");

        f.debug_struct("Config")
            .field("build_dir", &self.build_dir)
            .field("docker_username", &self.docker_username)
            .field("docker_password", &redacted(&self.docker_password))
            .field("github_token", &redacted(&self.github_token))
            .field("github_api_url", &self.github_api_url)
            .field("git_remote_template", &self.git_remote_template)
            .field("clone_depth", &self.clone_depth)
            .field("stage_timeout", &self.stage_timeout)
            .field("push_retries", &self.push_retries)
            .field("status_retries", &self.status_retries)
            .field("status_timeout", &self.status_timeout)
            .field("database_url", &redacted(&self.database_url))
            .field("logs_bucket", &self.logs_bucket)
            .finish()
    }
}
