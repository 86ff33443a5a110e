//! Conveyor Store
//!
//! Persistence collaborators for the build pipeline:
//! - `db` / `repository`: build and artifact metadata in Postgres
//! - `logs`: build logs buffered in memory and flushed to blob storage on close

pub mod db;
pub mod logs;
pub mod repository;
