//! Publisher service
//!
//! Tags the built image and pushes each tag to the registry. Both steps
//! work through their tags in order and stop at the first failure, leaving
//! earlier tags in place.

use conveyor_core::SharedSink;
use std::sync::Arc;
use tracing::info;

use crate::error::EngineError;
use crate::repository::ContainerEngine;
use crate::retry::{RetryPolicy, retry};

pub struct Publisher {
    engine: Arc<dyn ContainerEngine>,
    push_retry: RetryPolicy,
}

impl Publisher {
    /// Creates a publisher
    ///
    /// # Arguments
    /// * `engine` - Container engine repository
    /// * `push_retry` - Retry policy applied to each pushed tag
    pub fn new(engine: Arc<dyn ContainerEngine>, push_retry: RetryPolicy) -> Self {
        Self { engine, push_retry }
    }

    /// Applies every tag to `image`, replacing existing tags of the same name
    pub async fn tag(&self, image: &str, tags: &[String]) -> Result<(), EngineError> {
        for tag in tags {
            self.engine.tag(image, tag).await?;
            info!("Tagged {}:{}", image, tag);
        }
        Ok(())
    }

    /// Pushes every tag of `image`
    ///
    /// Transient failures of a single tag are retried within the push
    /// policy; once the budget is spent the remaining tags are skipped.
    pub async fn push(
        &self,
        image: &str,
        output: &SharedSink,
        tags: &[String],
    ) -> Result<(), EngineError> {
        for tag in tags {
            let what = format!("push of {}:{}", image, tag);

            retry(self.push_retry, &what, EngineError::is_transient, || {
                self.engine.push(image, tag, output)
            })
            .await?;

            info!("Pushed {}:{}", image, tag);
        }
        Ok(())
    }
}
