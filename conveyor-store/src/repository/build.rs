//! Build Repository
//!
//! Handles all database operations related to build records.

use conveyor_core::{BuildRecord, BuildStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a new pending build
pub async fn create(
    pool: &PgPool,
    id: Uuid,
    repository: &str,
    commit_sha: &str,
    branch: &str,
) -> Result<BuildRecord, sqlx::Error> {
    let now = chrono::Utc::now();

    let record = BuildRecord {
        id,
        repository: repository.to_string(),
        commit_sha: commit_sha.to_string(),
        branch: branch.to_string(),
        status: BuildStatus::Pending,
        created_at: now,
        completed_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO builds (id, repository, commit_sha, branch, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(repository)
    .bind(commit_sha)
    .bind(branch)
    .bind(BuildStatus::Pending.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(record)
}

/// Mark a build as finished with the given status
///
/// Returns `false` when no build with that id exists.
pub async fn complete(pool: &PgPool, id: Uuid, status: BuildStatus) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE builds
        SET status = $2, completed_at = $3
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Find a build by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<BuildRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, BuildRow>(
        r#"
        SELECT id, repository, commit_sha, branch, status, created_at, completed_at
        FROM builds
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct BuildRow {
    id: Uuid,
    repository: String,
    commit_sha: String,
    branch: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<BuildRow> for BuildRecord {
    fn from(row: BuildRow) -> Self {
        BuildRecord {
            id: row.id,
            repository: row.repository,
            commit_sha: row.commit_sha,
            branch: row.branch,
            status: BuildStatus::from_db(&row.status),
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}
