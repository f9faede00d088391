//! Main Entrypoint for the Voice Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Resolving the system prompt and the chat API client.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and closing every session on shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use voice_relay_api::{
    config::{Config, Provider},
    router::create_router,
    state::AppState,
};
use voice_relay_core::{
    gemini::GeminiChatModel,
    llm_client::{CannedChatModel, ChatModel, OpenAICompatibleClient},
    prompt::load_system_prompt,
    registry::SessionRegistry,
};

/// How long open WebSocket sessions get to close after the server stops.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Waits for Ctrl+C or SIGTERM, then closes every active session.
async fn shutdown_signal(registry: SessionRegistry) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal. Shutting down gracefully...");
    registry.shutdown_all().await;
}

/// Builds the chat API client for the configured provider.
fn build_chat_model(config: &Config) -> anyhow::Result<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match &config.provider {
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .google_api_key
                .clone()
                .context("GOOGLE_API_KEY is required for the gemini provider")?;
            Arc::new(GeminiChatModel::new(api_key, config.chat_model.clone()))
        }
        Provider::OpenAI => {
            info!("Using OpenAI-compatible provider.");
            let api_key = config
                .openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required for the openai provider")?;
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(api_base) = &config.openai_api_base {
                openai_config = openai_config.with_api_base(api_base);
            }
            Arc::new(OpenAICompatibleClient::new(
                openai_config,
                config.chat_model.clone(),
            ))
        }
        Provider::Offline => {
            info!("Using offline canned replies; no chat API will be contacted.");
            Arc::new(CannedChatModel::new())
        }
    };
    Ok(model)
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
    let system_prompt = load_system_prompt(config.prompts_path.as_deref())?;
    let chat_model = build_chat_model(&config)?;

    let app_state = Arc::new(AppState::new(config.clone(), chat_model, system_prompt));
    let registry = app_state.registry.clone();

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
        static_dir = %config.static_dir.display(),
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("WebSocket endpoint: ws://{}/ws", config.bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(registry.clone()))
    .await?;

    // Upgraded sockets outlive the HTTP server; let them send their close frames.
    if tokio::time::timeout(SESSION_DRAIN_TIMEOUT, registry.wait_closed())
        .await
        .is_err()
    {
        warn!(
            remaining = registry.len().await,
            "Sessions still open after the drain timeout"
        );
    }

    info!("Server has shut down.");
    Ok(())
}
