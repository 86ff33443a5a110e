//! Conveyor Core
//!
//! Core types and abstractions for the Conveyor image build pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (BuildRequest, Artifact, etc.)
//! - DTOs: Data transfer objects for the commit status API

pub mod domain;
pub mod dto;

pub use domain::artifact::{Artifact, BuildRecord, BuildStatus};
pub use domain::build::{BuildOutcome, BuildRequest, Stage};
pub use domain::image::ImageDescriptor;
pub use domain::output::{MemorySink, OutputSink, SharedSink, StdoutSink, TeeSink};
pub use domain::repo::{RepoId, RepoIdError};
pub use domain::status::{CommitState, STATUS_CONTEXT};
