//! Container engine repository
//!
//! Handles communication with the container daemon and registry:
//! - Pulling images (cache warming)
//! - Building images from a checked-out tree
//! - Tagging and pushing images

use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use conveyor_core::{ImageDescriptor, SharedSink};
use futures_util::StreamExt;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::EngineError;
use crate::process::run_streaming;

/// Repository trait for container engine operations
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pulls `repository:tag` into the local image cache
    ///
    /// # Returns
    /// `EngineError::TagNotFound` if the registry has no such tag
    async fn pull(&self, repository: &str, tag: &str, output: &SharedSink)
    -> Result<(), EngineError>;

    /// Builds the image `image` from the tree in `context_dir`
    async fn build_image(
        &self,
        context_dir: &Path,
        image: &str,
        output: &SharedSink,
    ) -> Result<(), EngineError>;

    /// Resolves a locally present image by name
    async fn inspect(&self, image: &str) -> Result<ImageDescriptor, EngineError>;

    /// Points `image:tag` at `image`, replacing any existing tag
    async fn tag(&self, image: &str, tag: &str) -> Result<(), EngineError>;

    /// Pushes `image:tag` to its registry
    async fn push(&self, image: &str, tag: &str, output: &SharedSink) -> Result<(), EngineError>;
}

/// Docker implementation of ContainerEngine
///
/// Pull, tag, push and inspect go through the daemon API. Builds run the
/// docker CLI so the build context honours `.dockerignore`.
pub struct DockerEngine {
    docker: Docker,
    credentials: Option<DockerCredentials>,
    cli: String,
}

impl DockerEngine {
    /// Creates an engine for an existing daemon connection
    ///
    /// # Arguments
    /// * `docker` - Daemon connection
    /// * `username`, `password` - Registry credentials, if any
    pub fn new(docker: Docker, username: Option<String>, password: Option<String>) -> Self {
        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(DockerCredentials {
                username: Some(username),
                password: Some(password),
                ..Default::default()
            }),
            _ => None,
        };

        Self {
            docker,
            credentials,
            cli: "docker".to_string(),
        }
    }

    /// Connects to the local daemon using the standard socket or DOCKER_HOST
    pub fn connect(username: Option<String>, password: Option<String>) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker, username, password))
    }
}

/// Writes one progress record from a pull or push stream
fn write_progress(
    output: &SharedSink,
    id: Option<&str>,
    status: Option<&str>,
    progress: Option<&str>,
) {
    let Some(status) = status else {
        return;
    };

    let line = match (id, progress) {
        (Some(id), Some(progress)) => format!("{}: {} {}", id, status, progress),
        (Some(id), None) => format!("{}: {}", id, status),
        (None, Some(progress)) => format!("{} {}", status, progress),
        (None, None) => status.to_string(),
    };

    if let Err(e) = output.write_line(&line) {
        debug!("Dropped progress line: {}", e);
    }
}

/// Maps a daemon error raised while pulling `repository:tag`
///
/// Every 404 counts as a missing tag. The daemon also answers 404 with
/// "pull access denied ... repository does not exist or may require 'docker
/// login'" both for repositories that were never pushed and for private ones
/// pulled without credentials, and the two cannot be told apart here. A
/// first build relies on the former being a miss, so wrong credentials show
/// up as a cache miss on pull and fail later at push.
fn pull_error(repository: &str, tag: &str, error: bollard::errors::Error) -> EngineError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => EngineError::TagNotFound {
            repository: repository.to_string(),
            tag: tag.to_string(),
        },
        e => e.into(),
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull(
        &self,
        repository: &str,
        tag: &str,
        output: &SharedSink,
    ) -> Result<(), EngineError> {
        #[allow(deprecated)]
        let options = bollard::image::CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };

        #[allow(deprecated)]
        let mut stream = self
            .docker
            .create_image(Some(options), None, self.credentials.clone());

        while let Some(info) = stream.next().await {
            let info = info.map_err(|e| pull_error(repository, tag, e))?;
            if let Some(error) = info.error {
                return Err(EngineError::Registry(error));
            }
            write_progress(
                output,
                info.id.as_deref(),
                info.status.as_deref(),
                info.progress.as_deref(),
            );
        }

        Ok(())
    }

    async fn build_image(
        &self,
        context_dir: &Path,
        image: &str,
        output: &SharedSink,
    ) -> Result<(), EngineError> {
        let mut command = Command::new(&self.cli);
        command
            .arg("build")
            .arg("-t")
            .arg(image)
            .arg(".")
            .current_dir(context_dir);

        run_streaming(command, output).await?;
        Ok(())
    }

    async fn inspect(&self, image: &str) -> Result<ImageDescriptor, EngineError> {
        let inspect = self.docker.inspect_image(image).await?;

        Ok(ImageDescriptor {
            id: inspect.id.unwrap_or_default(),
            name: image.to_string(),
            repo_tags: inspect.repo_tags.unwrap_or_default(),
            size: inspect.size,
        })
    }

    async fn tag(&self, image: &str, tag: &str) -> Result<(), EngineError> {
        let options = bollard::query_parameters::TagImageOptions {
            repo: Some(image.to_string()),
            tag: Some(tag.to_string()),
        };

        self.docker.tag_image(image, Some(options)).await?;
        Ok(())
    }

    async fn push(&self, image: &str, tag: &str, output: &SharedSink) -> Result<(), EngineError> {
        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        #[allow(deprecated)]
        let mut stream = self
            .docker
            .push_image(image, Some(options), self.credentials.clone());

        while let Some(info) = stream.next().await {
            let info = info?;
            if let Some(error) = info.error {
                return Err(EngineError::Registry(error));
            }
            write_progress(
                output,
                None,
                info.status.as_deref(),
                info.progress.as_deref(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::MemorySink;
    use std::sync::Arc;

    #[test]
    fn test_write_progress_formats() {
        let sink = MemorySink::new();
        let output: SharedSink = Arc::new(sink.clone());

        write_progress(&output, Some("a1b2"), Some("Downloading"), Some("[==> ]"));
        write_progress(&output, None, Some("Pushed"), None);
        write_progress(&output, Some("a1b2"), None, Some("ignored"));

        assert_eq!(
            sink.contents_lossy(),
            "a1b2: Downloading [==> ]\nPushed\n"
        );
    }

    fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_pull_404s_are_cache_misses() {
        let unknown_manifest = server_error(
            404,
            "manifest for acme/widgets:main not found: manifest unknown",
        );
        let never_pushed = server_error(
            404,
            "pull access denied for acme/widgets, repository does not exist or may require 'docker login'",
        );

        for error in [unknown_manifest, never_pushed] {
            let mapped = pull_error("acme/widgets", "main", error);
            assert!(mapped.is_tag_not_found());
            assert_eq!(
                mapped.to_string(),
                "tag main not found in repository acme/widgets"
            );
        }
    }

    #[test]
    fn test_other_pull_errors_are_not_misses() {
        let mapped = pull_error("acme/widgets", "main", server_error(500, "internal"));
        assert!(!mapped.is_tag_not_found());
        assert!(matches!(mapped, EngineError::Daemon(_)));
    }
}
