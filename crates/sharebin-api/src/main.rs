use sharebin_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    sharebin_api::telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Initialize the application (database, storage, services, routes)
    let (state, router) = sharebin_api::setup::initialize_app(config.clone()).await?;

    // Start the server and the expiry reaper
    sharebin_api::setup::server::start_server(&config, router, state).await?;

    Ok(())
}
