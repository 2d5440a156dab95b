//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use lectern_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_format())
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = config.environment(),
        "Configuration loaded and validated successfully"
    );

    let repository = database::setup_repository(&config).await?;
    let store = storage::setup_storage(&config).await?;
    let converter = services::build_converter(&config)?;

    let state = services::initialize_services(&config, repository, store, converter)?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
