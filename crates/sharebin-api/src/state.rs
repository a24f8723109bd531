//! Application state shared by every handler.

use sharebin_core::Config;
use sharebin_db::ShareRepository;
use sharebin_services::{ExpiryReaper, ShareService};
use sharebin_storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub shares: ShareService,
    pub repository: Arc<dyn ShareRepository>,
    pub storage: Arc<dyn Storage>,
    pub reaper: Arc<ExpiryReaper>,
    /// Omit `details` and `error_type` from error bodies.
    pub hide_error_details: bool,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: Arc<dyn ShareRepository>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let shares = ShareService::new(&config, repository.clone(), storage.clone());
        let reaper = Arc::new(ExpiryReaper::from_config(
            &config,
            repository.clone(),
            storage.clone(),
        ));
        Self {
            hide_error_details: config.is_production(),
            config,
            shares,
            repository,
            storage,
            reaper,
        }
    }
}
