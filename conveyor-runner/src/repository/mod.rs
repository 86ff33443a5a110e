//! Repository layer
//!
//! Repositories wrap the external systems a build talks to: the git
//! remote, the container daemon and registry, and the metadata database.
//! They carry no pipeline logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod engine;
mod metadata;
mod source;

// Re-export traits
pub use engine::ContainerEngine;
pub use metadata::MetadataRepository;
pub use source::SourceControl;

// Re-export implementations
pub use engine::DockerEngine;
pub use metadata::PgMetadataRepository;
pub use source::GitCli;
