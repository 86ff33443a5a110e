//! Repository Module
//!
//! Data access layer for build metadata.
//! Each repository handles database operations for a specific domain entity.

pub mod artifact;
pub mod build;

// Re-export for convenience
pub use artifact as artifact_repository;
pub use build as build_repository;
