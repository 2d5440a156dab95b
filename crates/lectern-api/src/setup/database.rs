//! Document repository setup

use anyhow::{Context, Result};
use lectern_core::{Config, DocumentStoreKind};
use lectern_db::{DocumentRepository, MemoryDocumentRepository, PostgresDocumentRepository};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Build the repository selected by `DOCUMENT_STORE`.
pub async fn setup_repository(config: &Config) -> Result<Arc<dyn DocumentRepository>> {
    match config.document_store() {
        DocumentStoreKind::Postgres => {
            let pool = setup_database(config).await?;
            Ok(Arc::new(PostgresDocumentRepository::new(pool)))
        }
        DocumentStoreKind::Memory => {
            let repository = match config.document_seed_path() {
                Some(path) => MemoryDocumentRepository::from_seed_file(path)
                    .await
                    .with_context(|| format!("Failed to load document seed {}", path))?,
                None => MemoryDocumentRepository::new(),
            };
            tracing::info!(
                documents = repository.len().await,
                "Using in-memory document store"
            );
            Ok(Arc::new(repository))
        }
    }
}

/// Connect the pool and run pending migrations.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let url = config
        .database_url()
        .context("DATABASE_URL must be set when DOCUMENT_STORE=postgres")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
