//! Container image domain types

use serde::{Deserialize, Serialize};

/// Descriptor of a locally built image, as resolved from the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Content-addressed image id ("sha256:...")
    pub id: String,
    /// Name the image was built under (the repository identifier)
    pub name: String,
    pub repo_tags: Vec<String>,
    pub size: Option<i64>,
}

impl ImageDescriptor {
    /// Reference for a given tag of this image, e.g. "acme/widgets:main"
    pub fn reference(&self, tag: &str) -> String {
        format!("{}:{}", self.name, tag)
    }
}
