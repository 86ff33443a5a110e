//! Artifact Repository
//!
//! Handles all database operations related to artifacts.

use conveyor_core::Artifact;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert an artifact linked to its build
///
/// # Returns
/// The id generated by the database
pub async fn insert(pool: &PgPool, build_id: Uuid, image: &str) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO artifacts (build_id, image)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(build_id)
    .bind(image)
    .fetch_one(pool)
    .await?;

    tracing::debug!("Artifact {} created for build {}", id, build_id);

    Ok(id)
}

/// Get all artifacts produced by a build
pub async fn find_by_build(pool: &PgPool, build_id: Uuid) -> Result<Vec<Artifact>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ArtifactRow>(
        r#"
        SELECT id, build_id, image
        FROM artifacts
        WHERE build_id = $1
        "#,
    )
    .bind(build_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: Uuid,
    build_id: Uuid,
    image: String,
}

impl From<ArtifactRow> for Artifact {
    fn from(row: ArtifactRow) -> Self {
        Artifact {
            id: row.id,
            build_id: row.build_id,
            image: row.image,
        }
    }
}
