//! Main Entrypoint for the Cardash API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the reasoning and speech-to-text clients for the selected provider.
//! 3. Spawning the dispatcher session around a simulated vehicle.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use cardash_api::{config::Config, router::create_router, state::AppState};
use cardash_core::{
    ActionRegistry, CommandDispatcher, DispatcherConfig, SimulatedVehicle,
    reasoning::{OpenAICompatibleClient, ReasoningClient},
    session,
    speech::{SpeechToText, WhisperClient},
};
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            prompts.insert(prompt_key, fs::read_to_string(&path)?);
        }
    }
    Ok(prompts)
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
    info!("Configuration loaded. Initializing the dispatcher...");

    // --- 3. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = prompts
        .get("system_prompt")
        .context("system_prompt.md not found in prompts directory")?
        .clone();

    let api_key = config
        .api_key()
        .context("No API key configured for the selected provider")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider.api_base());

    let reasoning: Arc<dyn ReasoningClient> =
        Arc::new(OpenAICompatibleClient::new(openai_config.clone()));
    let speech: Arc<dyn SpeechToText> = Arc::new(WhisperClient::new(
        openai_config,
        config.transcription_model.clone(),
        config.transcription_language.clone(),
    ));

    let dispatcher_config = DispatcherConfig {
        timeout: config.reasoning_timeout,
        history_window: config.history_window,
        ..DispatcherConfig::new(config.chat_model.clone(), system_prompt)
    };
    let dispatcher = CommandDispatcher::new(
        dispatcher_config,
        ActionRegistry::new(SimulatedVehicle::default()),
        reasoning,
    );
    let (session, session_task) = session::spawn(dispatcher);

    let app_state = Arc::new(AppState { session, speech });

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
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Upgraded WebSocket connections may still hold session handles.
    session_task.abort();
    info!("Server has shut down.");
    Ok(())
}
