//! Main Entrypoint for the Xylor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the chat client for the configured provider.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use xylor_api::{config::Config, router::create_router, state::AppState};
use xylor_core::llm_client::{LLMClient, OpenAICompatibleClient};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    info!(provider = ?config.provider, "Using chat provider.");
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.api_key)
        .with_api_base(config.provider.api_base());
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let app_state = Arc::new(AppState {
        llm_client,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        agent_keyword = %config.agent_matching.name_keyword,
        agent_prefix = %config.agent_matching.identity_prefix,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
