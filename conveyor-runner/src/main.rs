//! Conveyor Runner
//!
//! Builds a container image from one commit of a repository, publishes it,
//! and reports the build state on the commit.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: git remote, container daemon, metadata database
//! - Services: status reporting, cache warming, checkout, build, publish
//! - Orchestrator: stage ordering and the pending/terminal status pair

mod config;
mod error;
mod process;
mod repository;
mod retry;
mod service;
#[cfg(test)]
mod testing;
mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conveyor_core::{SharedSink, StdoutSink};
use conveyor_store::logs::{LogStore, S3BlobStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;
use crate::repository::{DockerEngine, GitCli, PgMetadataRepository};
use crate::service::{BuildService, Orchestrator, PipelineSettings};

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Build and publish container images from git commits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, tag and push the image for one commit
    Build {
        /// Repository identifier, "owner/name"
        #[arg(long, env = "CONVEYOR_REPOSITORY")]
        repository: String,

        /// Commit to build
        #[arg(long, env = "CONVEYOR_COMMIT")]
        commit: String,

        /// Branch containing the commit
        #[arg(long, env = "CONVEYOR_BRANCH")]
        branch: String,

        /// Build identifier (generated when omitted)
        #[arg(long)]
        build_id: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            repository,
            commit,
            branch,
            build_id,
        } => {
            let config = load_config()?;
            info!("Loaded configuration: {:?}", config);

            let service = build_service(&config).await?;
            let build_id = build_id.unwrap_or_else(Uuid::new_v4);

            info!("Starting build {} of {}@{}", build_id, repository, commit);
            let summary = service.run(build_id, &repository, &commit, &branch).await;

            if let Some(key) = &summary.log_key {
                info!("Build log stored at {}", key);
            }
            if let Some(artifact_id) = summary.artifact_id {
                info!("Artifact {} recorded", artifact_id);
            }
            info!(
                "Build {} outcome: {}",
                summary.build_id,
                summary.outcome().as_str()
            );

            let failed_stage = summary.result.as_ref().err().and_then(|e| e.stage());
            summary
                .result
                .map(|image| info!("Published {} ({})", image.name, image.id))
                .with_context(|| match failed_stage {
                    Some(stage) => format!("Build {} failed during {}", build_id, stage),
                    None => format!("Build {} failed", build_id),
                })
        }
    }
}

/// Loads configuration from environment variables and validates it
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

/// Wires the production collaborators
async fn build_service(config: &Config) -> Result<BuildService> {
    let console: SharedSink = Arc::new(StdoutSink);

    let engine = DockerEngine::connect(
        config.docker_username.clone(),
        config.docker_password.clone(),
    )
    .context("Failed to connect to the Docker daemon")?;

    let reporter = service::status::from_token(
        config.github_token.as_deref(),
        &config.github_api_url,
        console.clone(),
    );
    info!("Status reporter: {}", reporter.kind());

    let orchestrator = Orchestrator::new(
        PipelineSettings::from_config(config),
        reporter,
        Arc::new(GitCli::new()),
        Arc::new(engine),
    );

    let mut service = BuildService::new(orchestrator, console);

    match &config.database_url {
        Some(url) => {
            let pool = conveyor_store::db::create_pool(url)
                .await
                .context("Failed to connect to the metadata database")?;
            conveyor_store::db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            service = service.with_metadata(Arc::new(PgMetadataRepository::new(pool)));
            info!("Recording build metadata");
        }
        None => warn!("DATABASE_URL not set, build metadata will not be recorded"),
    }

    match &config.logs_bucket {
        Some(bucket) => {
            let blobs = S3BlobStore::from_env(bucket.clone()).await;
            info!("Storing build logs in s3://{}", blobs.bucket());
            service = service.with_logs(LogStore::new(Arc::new(blobs)));
        }
        None => warn!("LOGS_BUCKET not set, build logs will only go to stdout"),
    }

    Ok(service)
}
