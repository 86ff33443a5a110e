//! Build metadata repository
//!
//! Records builds and the artifacts they produce:
//! - Build rows, created before the pipeline runs and completed after it
//! - Artifact rows linked to their build

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_core::{BuildOutcome, BuildRequest, BuildStatus};
use conveyor_store::repository::{artifact_repository, build_repository};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository trait for build metadata
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Records a new build in the pending state
    async fn create_build(&self, id: Uuid, request: &BuildRequest) -> Result<()>;

    /// Stores the terminal state of a build
    async fn complete_build(&self, id: Uuid, outcome: BuildOutcome) -> Result<()>;

    /// Records an image produced by a build
    ///
    /// # Returns
    /// The generated artifact id
    async fn insert_artifact(&self, build_id: Uuid, image: &str) -> Result<Uuid>;
}

/// Postgres implementation of MetadataRepository
pub struct PgMetadataRepository {
    pool: PgPool,
}

impl PgMetadataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataRepository for PgMetadataRepository {
    async fn create_build(&self, id: Uuid, request: &BuildRequest) -> Result<()> {
        build_repository::create(
            &self.pool,
            id,
            &request.repository,
            &request.commit,
            &request.branch,
        )
        .await
        .context("Failed to record build")?;

        Ok(())
    }

    async fn complete_build(&self, id: Uuid, outcome: BuildOutcome) -> Result<()> {
        let updated = build_repository::complete(&self.pool, id, BuildStatus::from(outcome))
            .await
            .context("Failed to complete build")?;

        if !updated {
            anyhow::bail!("Build {} not found", id);
        }

        Ok(())
    }

    async fn insert_artifact(&self, build_id: Uuid, image: &str) -> Result<Uuid> {
        artifact_repository::insert(&self.pool, build_id, image)
            .await
            .context("Failed to record artifact")
    }
}
