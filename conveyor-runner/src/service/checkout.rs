//! Checkout service
//!
//! Produces a shallow clone of a branch with the requested commit checked
//! out.

use conveyor_core::{RepoId, SharedSink};
use std::path::Path;
use std::sync::Arc;

use crate::config::REPOSITORY_PLACEHOLDER;
use crate::error::SourceError;
use crate::repository::SourceControl;

pub struct Checkout {
    source: Arc<dyn SourceControl>,
    remote_template: String,
    depth: u32,
}

impl Checkout {
    /// Creates a checkout service
    ///
    /// # Arguments
    /// * `source` - Source-control repository
    /// * `remote_template` - Clone URL with a `{repository}` placeholder
    /// * `depth` - History depth of the clone
    pub fn new(source: Arc<dyn SourceControl>, remote_template: impl Into<String>, depth: u32) -> Self {
        Self {
            source,
            remote_template: remote_template.into(),
            depth,
        }
    }

    /// Clone URL for a repository
    pub fn remote_url(&self, repository: &RepoId) -> String {
        self.remote_template
            .replace(REPOSITORY_PLACEHOLDER, &repository.to_string())
    }

    /// Clones `branch` into `dest` and checks out `commit`
    pub async fn checkout(
        &self,
        repository: &RepoId,
        branch: &str,
        commit: &str,
        dest: &Path,
        output: &SharedSink,
    ) -> Result<(), SourceError> {
        let url = self.remote_url(repository);

        self.source
            .clone_branch(&url, branch, self.depth, dest, output)
            .await?;
        self.source.checkout(dest, commit, output).await
    }
}
