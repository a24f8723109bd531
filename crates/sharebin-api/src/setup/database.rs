//! Database setup and initialization

use anyhow::{Context, Result};
use sharebin_core::Config;
use sharebin_db::{MemoryShareRepository, PgShareRepository, ShareRepository};
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Connect the record store. `memory://` selects the in-process store;
/// anything else is a Postgres URL and gets pending migrations applied.
pub async fn setup_database(config: &Config) -> Result<Arc<dyn ShareRepository>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-process record store; shares are lost on restart");
        return Ok(Arc::new(MemoryShareRepository::new()));
    }

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    // Run pending migrations on startup (path: workspace migrations/ from crate root)
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(PgShareRepository::new(pool)))
}
