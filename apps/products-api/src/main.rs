//! Products API - REST server

use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to MongoDB at {}", config.mongodb.url());

    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb).await?;

    info!(
        "Successfully connected to MongoDB database: {}",
        config.mongodb.database()
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upload_timeout_secs))
        .build()?;

    let state = AppState {
        config: config.clone(),
        mongo_client,
        http,
    };

    api::init_indexes(&state).await?;

    let api_routes = api::routes(&state);
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::health::router(state.clone()));

    info!("Starting Products API on port {}", state.config.server.port);

    let client = state.mongo_client.clone();
    create_production_app(
        app,
        &state.config.server,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: closing MongoDB connections");
            client.shutdown().await;
            info!("MongoDB connection closed");
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Products API shutdown complete");
    Ok(())
}
