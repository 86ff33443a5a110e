//! Per-build working directories
//!
//! Each build gets a fresh directory under the build root, named after the
//! commit plus a random suffix. The directory is removed when the `Workspace`
//! is dropped, on success, failure, and cancellation alike.

use std::io;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

/// A uniquely named, self-deleting build directory
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Allocates a working directory for `commit` under `root`
    ///
    /// The root is created if it does not exist yet.
    pub fn allocate(root: &Path, commit: &str) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;

        let prefix = format!("{}-", sanitize(commit));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root)?;

        debug!("Allocated workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory now, logging instead of failing if it cannot be
    /// removed
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}

/// Keeps a commit identifier usable as a file name prefix
fn sanitize(commit: &str) -> String {
    let cleaned: String = commit
        .chars()
        .take(40)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        "build".to_string()
    } else {
        cleaned
    }
}
