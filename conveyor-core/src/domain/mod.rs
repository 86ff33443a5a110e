//! Core domain types
//!
//! This module contains the core domain structures used across Conveyor crates.
//! These types are shared between the store (for persistence) and the runner
//! (for execution).

pub mod artifact;
pub mod build;
pub mod image;
pub mod output;
pub mod repo;
pub mod status;
