//! Service layer
//!
//! Services contain the pipeline logic. Each one drives a repository for a
//! single concern (status, cache, checkout, build, publish), and the
//! orchestrator composes them into one build.
//!
//! Collaborators are injected as trait objects to enable testing.

pub mod build;
pub mod cache;
pub mod checkout;
pub mod executor;
pub mod orchestrator;
pub mod publisher;
pub mod status;

// Re-export traits
pub use status::StatusReporter;

// Re-export implementations
pub use build::BuildService;
pub use orchestrator::{Orchestrator, PipelineSettings};
