//! Application setup and initialization
//!
//! Everything `main` needs to go from a `Config` to a running server, split
//! so tests can build the same router.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use sharebin_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let repository = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState::new(config.clone(), repository, storage));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
