//! Artifact storage setup

use anyhow::{Context, Result};
use sharebin_core::Config;
use sharebin_storage::{LocalStorage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = LocalStorage::new(&config.storage_path)
        .await
        .with_context(|| format!("Failed to open storage directory {}", config.storage_path))?;
    tracing::info!(path = %config.storage_path, "Artifact storage ready");
    Ok(Arc::new(storage))
}
