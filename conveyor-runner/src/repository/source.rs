//! Source-control repository
//!
//! Materializes a source tree from a remote:
//! - Shallow clone of a single branch
//! - Detached checkout of an exact commit

use async_trait::async_trait;
use conveyor_core::SharedSink;
use std::path::Path;
use tokio::process::Command;

use crate::error::SourceError;
use crate::process::run_streaming;

/// Repository trait for source-control operations
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clones `branch` of `remote_url` into `dest`
    ///
    /// # Arguments
    /// * `remote_url` - Clone URL of the remote
    /// * `branch` - Branch to clone
    /// * `depth` - Number of commits of history to fetch
    /// * `dest` - Empty destination directory
    /// * `output` - Receives the tool's output
    async fn clone_branch(
        &self,
        remote_url: &str,
        branch: &str,
        depth: u32,
        dest: &Path,
        output: &SharedSink,
    ) -> Result<(), SourceError>;

    /// Checks out `commit` in an existing clone, discarding local changes
    async fn checkout(
        &self,
        dir: &Path,
        commit: &str,
        output: &SharedSink,
    ) -> Result<(), SourceError>;
}

/// git CLI implementation of SourceControl
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects refs that git would parse as options
fn check_ref(value: &str) -> Result<(), SourceError> {
    if value.is_empty() || value.starts_with('-') {
        return Err(SourceError::InvalidRef(value.to_string()));
    }
    Ok(())
}

#[async_trait]
impl SourceControl for GitCli {
    async fn clone_branch(
        &self,
        remote_url: &str,
        branch: &str,
        depth: u32,
        dest: &Path,
        output: &SharedSink,
    ) -> Result<(), SourceError> {
        check_ref(branch)?;

        let mut command = Command::new(&self.program);
        command
            .arg("clone")
            .arg(format!("--depth={}", depth))
            .arg(format!("--branch={}", branch))
            .arg("--")
            .arg(remote_url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0");

        run_streaming(command, output).await?;
        Ok(())
    }

    async fn checkout(
        &self,
        dir: &Path,
        commit: &str,
        output: &SharedSink,
    ) -> Result<(), SourceError> {
        check_ref(commit)?;

        let mut command = Command::new(&self.program);
        command
            .arg("checkout")
            .arg("-qf")
            .arg(commit)
            .current_dir(dir);

        run_streaming(command, output).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::MemorySink;
    use std::sync::Arc;

    #[test]
    fn test_check_ref() {
        assert!(check_ref("main").is_ok());
        assert!(check_ref("abc123").is_ok());
        assert!(check_ref("feature/login").is_ok());
        assert!(matches!(
            check_ref("--upload-pack=evil"),
            Err(SourceError::InvalidRef(_))
        ));
        assert!(check_ref("").is_err());
    }

    #[tokio::test]
    async fn test_option_like_commit_is_rejected_before_running_git() {
        let dir = tempfile::tempdir().unwrap();
        let output: SharedSink = Arc::new(MemorySink::new());

        let err = GitCli::new()
            .checkout(dir.path(), "--orphan", &output)
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::InvalidRef(_)));
    }
}
