//! Cache warming service
//!
//! Pulls a previously published image so the build can reuse its layers.
//! Missing tags are expected (first build of a branch) and skipped.

use conveyor_core::SharedSink;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::repository::ContainerEngine;

/// Best-effort image cache warmer
pub struct CacheResolver {
    engine: Arc<dyn ContainerEngine>,
}

impl CacheResolver {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Pulls the first available tag out of `candidates`
    ///
    /// Candidates are tried in order. A missing tag moves on to the next
    /// candidate; any other failure is returned immediately.
    ///
    /// # Returns
    /// The tag that was pulled, or `None` if every candidate was missing
    pub async fn warm(
        &self,
        repository: &str,
        candidates: &[&str],
        output: &SharedSink,
    ) -> Result<Option<String>, EngineError> {
        for tag in candidates {
            match self.engine.pull(repository, tag, output).await {
                Ok(()) => {
                    info!("Warmed cache from {}:{}", repository, tag);
                    return Ok(Some(tag.to_string()));
                }
                Err(e) if e.is_tag_not_found() => {
                    debug!("No cached image at {}:{}", repository, tag);
                }
                Err(e) => return Err(e),
            }
        }

        info!("No cached image found for {}", repository);
        Ok(None)
    }
}
